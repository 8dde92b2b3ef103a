//! Race-safe find-or-create lookup caches for hostnames and HTTP status
//! codes.
//!
//! A `DashMap` keyed by resource name, with one `tokio::sync::Mutex` per
//! shard acquired before the find-or-create round-trip — no fencing tokens
//! or leases, since the only thing that matters is not racing two local
//! `INSERT`s for the same name.

use crate::db::models::{HTTP_CODE_NA, HTTP_CODE_NA_ID};
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

const SHARD_COUNT: usize = 16;

fn shard_of(name: &str) -> usize {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

/// A generic name -> small-integer-id lookup cache with at-most-once-per-
/// name insertion under concurrency.
pub struct LookupCache {
    table: &'static str,
    name_column: &'static str,
    id_column: &'static str,
    entries: DashMap<String, i32>,
    shards: Vec<Mutex<()>>,
}

impl LookupCache {
    fn new(table: &'static str, name_column: &'static str, id_column: &'static str) -> Self {
        Self {
            table,
            name_column,
            id_column,
            entries: DashMap::new(),
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Create the `hosts` lookup cache.
    pub fn hosts() -> Self {
        Self::new("hosts", "hostname", "id")
    }

    /// Create the `http_codes` lookup cache. Callers should special-case
    /// `"N/A"` before calling `resolve` so the common
    /// "no status" path never takes the lock.
    pub fn http_codes() -> Self {
        Self::new("http_codes", "code", "id")
    }

    /// Warm the cache from the current DB state at startup.
    pub async fn warm(&self, pool: &DbPool) -> DbResult<()> {
        let rows: Vec<(String, i32)> = sqlx::query_as(&format!(
            "SELECT {}, {} FROM {}",
            self.name_column, self.id_column, self.table
        ))
        .fetch_all(pool.inner())
        .await
        .map_err(DbError::Sqlx)?;

        for (name, id) in rows {
            self.entries.insert(name, id);
        }

        Ok(())
    }

    /// Resolve `name` to its id, inserting a new row on first observation.
    pub async fn resolve(&self, pool: &DbPool, name: &str) -> DbResult<i32> {
        if let Some(id) = self.entries.get(name) {
            return Ok(*id);
        }

        let shard = &self.shards[shard_of(name)];
        let _guard = shard.lock().await;

        // Re-check inside the lock: another task may have just inserted it.
        if let Some(id) = self.entries.get(name) {
            return Ok(*id);
        }

        sqlx::query(&format!(
            "INSERT IGNORE INTO {} ({}) VALUES (?)",
            self.table, self.name_column
        ))
        .bind(name)
        .execute(pool.inner())
        .await
        .map_err(DbError::Sqlx)?;

        let id: i32 = sqlx::query_scalar(&format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.id_column, self.table, self.name_column
        ))
        .bind(name)
        .fetch_one(pool.inner())
        .await
        .map_err(DbError::Sqlx)?;

        self.entries.insert(name.to_string(), id);
        Ok(id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Both lookup caches, shared across the ingestion service via `Arc`.
pub struct LookupCaches {
    pub hosts: LookupCache,
    pub http_codes: LookupCache,
}

impl LookupCaches {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { hosts: LookupCache::hosts(), http_codes: LookupCache::http_codes() })
    }

    pub async fn warm(&self, pool: &DbPool) -> DbResult<()> {
        self.hosts.warm(pool).await?;
        self.http_codes.warm(pool).await?;
        Ok(())
    }

    /// Resolve an HTTP status code, short-circuiting the `"N/A"` sentinel
    /// to id 0 without taking any lock.
    pub async fn resolve_http_code(&self, pool: &DbPool, code: Option<&str>) -> DbResult<i32> {
        match code {
            None => Ok(HTTP_CODE_NA_ID),
            Some(code) if code == HTTP_CODE_NA => Ok(HTTP_CODE_NA_ID),
            Some(code) => self.http_codes.resolve(pool, code).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_assignment_is_deterministic() {
        assert_eq!(shard_of("web1"), shard_of("web1"));
    }

    #[test]
    fn new_cache_starts_empty() {
        let cache = LookupCache::hosts();
        assert_eq!(cache.len(), 0);
    }
}
