//! Website find-or-create, the richer sibling of the generic
//! name -> id lookups in [`super::lookup`] — a website row carries mutable
//! attributes (`is_ssl`, `is_dev`, contact emails, `last_activity_at`) that
//! a plain id cache has no room for, so it gets its own small cache keyed
//! on domain instead of reusing `LookupCache`.

use crate::db::models::Website;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use dashmap::DashMap;
use tokio::sync::Mutex;

const SHARD_COUNT: usize = 16;

fn shard_of(domain: &str) -> usize {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    domain.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

/// Attributes supplied by an incoming record's source path/payload that may
/// seed a brand-new `websites` row. Never overwrites an existing row's
/// attributes — only the initial find-or-create insert uses these.
#[derive(Debug, Clone)]
pub struct WebsiteHints {
    pub is_ssl: bool,
    pub is_dev: bool,
}

impl WebsiteHints {
    /// Defaults for a website auto-provisioned from ingestion: `ssl=true,
    /// dev=false`.
    pub fn new() -> Self {
        Self { is_ssl: true, is_dev: false }
    }
}

impl Default for WebsiteHints {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WebsiteCache {
    ids: DashMap<String, i64>,
    shards: Vec<Mutex<()>>,
}

impl WebsiteCache {
    pub fn new() -> Self {
        Self {
            ids: DashMap::new(),
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    pub async fn warm(&self, pool: &DbPool) -> DbResult<()> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, domain FROM websites")
            .fetch_all(pool.inner())
            .await
            .map_err(DbError::Sqlx)?;

        for (id, domain) in rows {
            self.ids.insert(domain, id);
        }

        Ok(())
    }

    /// Resolve `domain` to its `websites.id`, creating the row on first
    /// observation with the hints carried on the triggering record.
    pub async fn resolve(&self, pool: &DbPool, domain: &str, hints: &WebsiteHints) -> DbResult<i64> {
        if let Some(id) = self.ids.get(domain) {
            return Ok(*id);
        }

        let shard = &self.shards[shard_of(domain)];
        let _guard = shard.lock().await;

        if let Some(id) = self.ids.get(domain) {
            return Ok(*id);
        }

        sqlx::query(
            "INSERT IGNORE INTO websites (domain, is_ssl, is_dev) VALUES (?, ?, ?)",
        )
        .bind(domain)
        .bind(hints.is_ssl)
        .bind(hints.is_dev)
        .execute(pool.inner())
        .await
        .map_err(DbError::Sqlx)?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM websites WHERE domain = ?")
            .bind(domain)
            .fetch_one(pool.inner())
            .await
            .map_err(DbError::Sqlx)?;

        self.ids.insert(domain.to_string(), id);
        Ok(id)
    }

    pub async fn get_by_domain(&self, pool: &DbPool, domain: &str) -> DbResult<Option<Website>> {
        sqlx::query_as::<_, Website>("SELECT * FROM websites WHERE domain = ?")
            .bind(domain)
            .fetch_optional(pool.inner())
            .await
            .map_err(DbError::Sqlx)
    }

    pub fn invalidate(&self, domain: &str) {
        self.ids.remove(domain);
    }
}

impl Default for WebsiteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cache_has_no_entries_cached() {
        let cache = WebsiteCache::new();
        assert!(cache.ids.is_empty());
    }

    #[test]
    fn invalidate_removes_a_cached_domain() {
        let cache = WebsiteCache::new();
        cache.ids.insert("example.com".to_string(), 1);
        cache.invalidate("example.com");
        assert!(cache.ids.get("example.com").is_none());
    }

    #[test]
    fn website_hints_default_to_ssl_and_non_dev() {
        let hints = WebsiteHints::default();
        assert!(hints.is_ssl);
        assert!(!hints.is_dev);
    }
}
