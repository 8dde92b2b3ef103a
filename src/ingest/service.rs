//! The ingestion pipeline proper: parse, normalize, resolve ids,
//! bulk-insert, bump activity timestamps.
//!
//! Stateless across requests — every piece of state it touches
//! ([`LookupCaches`], [`WebsiteCache`], the pool) is shared and injected
//! once at startup.

use crate::cache::{LookupCaches, WebsiteCache, WebsiteHints};
use crate::db::models::NormalizedRecord;
use crate::db::pool::DbPool;
use crate::error::{DbError, IngestError};
use crate::ingest::record::{parse_source_file, resolve_remote, resolve_timestamp, RawLogRecord};
use chrono::Utc;
use sqlx::{MySql, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

/// Response payload shape for `POST /api/logs`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub status: &'static str,
    pub received: usize,
    pub processed: usize,
}

pub struct IngestService {
    pool: DbPool,
    lookups: Arc<LookupCaches>,
    websites: Arc<WebsiteCache>,
}

impl IngestService {
    pub fn new(pool: DbPool, lookups: Arc<LookupCaches>, websites: Arc<WebsiteCache>) -> Self {
        Self { pool, lookups, websites }
    }

    /// Runs the full normalize-resolve-insert pipeline over one request's decoded JSON array.
    pub async fn ingest(&self, elements: Vec<serde_json::Value>) -> Result<IngestOutcome, IngestError> {
        let (received, normalized) = self.normalize_all(elements).await?;
        let processed = self.insert_batch(&normalized).await?;
        self.touch_activity(&normalized).await;

        Ok(IngestOutcome { status: "ok", received, processed })
    }

    /// Like [`ingest`](Self::ingest), but writes the bulk insert through an
    /// already-open transaction instead of a fresh pool checkout. Used by
    /// the upstream-sync receiver, which must commit the bulk insert and the
    /// `batch_deduplication` row together or not at all.
    pub async fn ingest_within_tx(
        &self,
        tx: &mut Transaction<'_, MySql>,
        elements: Vec<serde_json::Value>,
    ) -> Result<IngestOutcome, IngestError> {
        let (received, normalized) = self.normalize_all(elements).await?;
        let processed = Self::insert_batch_tx(tx, &normalized).await?;
        self.touch_activity(&normalized).await;

        Ok(IngestOutcome { status: "ok", received, processed })
    }

    async fn normalize_all(
        &self,
        elements: Vec<serde_json::Value>,
    ) -> Result<(usize, Vec<NormalizedRecord>), IngestError> {
        if elements.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        let received = elements.len();
        let now = Utc::now();

        let mut normalized = Vec::with_capacity(elements.len());
        for element in elements {
            match self.normalize_one(&element, now).await {
                Ok(record) => normalized.push(record),
                Err(reason) => {
                    tracing::warn!(reason = %reason, "skipping malformed log record");
                }
            }
        }

        Ok((received, normalized))
    }

    async fn normalize_one(
        &self,
        element: &serde_json::Value,
        now: chrono::DateTime<Utc>,
    ) -> Result<NormalizedRecord, crate::ingest::record::RecordRejection> {
        use crate::ingest::record::RecordRejection;

        let fields = RawLogRecord::from_value(element);
        let source_file = fields.source_file.as_deref().ok_or(RecordRejection::MissingSourceFile)?;
        let (domain, log_type) = parse_source_file(source_file)?;
        let host = fields.host.clone().ok_or(RecordRejection::MissingHost)?;

        let website_id = self
            .websites
            .resolve(&self.pool, &domain, &WebsiteHints::new())
            .await
            .map_err(|e| RecordRejection::LookupFailed(e.to_string()))?;

        let host_id = self
            .lookups
            .hosts
            .resolve(&self.pool, &host)
            .await
            .map_err(|e| RecordRejection::LookupFailed(e.to_string()))?;

        let code_id = self
            .lookups
            .resolve_http_code(&self.pool, fields.code.as_deref())
            .await
            .map_err(|e| RecordRejection::LookupFailed(e.to_string()))?;

        let remote = resolve_remote(fields.remote.as_deref(), fields.client.as_deref());
        let timestamp = resolve_timestamp(fields.log_timestamp.as_ref(), now);

        Ok(NormalizedRecord {
            website_id,
            log_type,
            timestamp,
            host_id,
            code_id,
            remote,
            raw_data: element.clone(),
        })
    }

    /// Single multi-row INSERT for the whole batch. Either
    /// every normalized record lands or none do — a failure here is a 500,
    /// not a partial write.
    async fn insert_batch(&self, records: &[NormalizedRecord]) -> Result<usize, IngestError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query = String::from(
            "INSERT INTO log_records (website_id, log_type, timestamp, host_id, code_id, remote, raw_data) VALUES ",
        );
        let placeholders: Vec<&str> = records.iter().map(|_| "(?, ?, ?, ?, ?, ?, ?)").collect();
        query.push_str(&placeholders.join(", "));

        let mut stmt = sqlx::query(&query);
        for record in records {
            stmt = stmt
                .bind(record.website_id)
                .bind(record.log_type.as_str())
                .bind(record.timestamp)
                .bind(record.host_id)
                .bind(record.code_id)
                .bind(record.remote.clone())
                .bind(record.raw_data.clone());
        }

        stmt.execute(self.pool.inner()).await.map_err(|e| IngestError::Db(DbError::Sqlx(e)))?;

        Ok(records.len())
    }

    /// Same statement as [`insert_batch`](Self::insert_batch), executed
    /// against an already-open transaction instead of a fresh pool checkout.
    async fn insert_batch_tx(
        tx: &mut Transaction<'_, MySql>,
        records: &[NormalizedRecord],
    ) -> Result<usize, IngestError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query = String::from(
            "INSERT INTO log_records (website_id, log_type, timestamp, host_id, code_id, remote, raw_data) VALUES ",
        );
        let placeholders: Vec<&str> = records.iter().map(|_| "(?, ?, ?, ?, ?, ?, ?)").collect();
        query.push_str(&placeholders.join(", "));

        let mut stmt = sqlx::query(&query);
        for record in records {
            stmt = stmt
                .bind(record.website_id)
                .bind(record.log_type.as_str())
                .bind(record.timestamp)
                .bind(record.host_id)
                .bind(record.code_id)
                .bind(record.remote.clone())
                .bind(record.raw_data.clone());
        }

        stmt.execute(&mut **tx).await.map_err(|e| IngestError::Db(DbError::Sqlx(e)))?;

        Ok(records.len())
    }

    /// Bumps `last_activity_at` to the max timestamp per touched website in
    /// one statement per website — best-effort, never fails
    /// the request.
    async fn touch_activity(&self, records: &[NormalizedRecord]) {
        let mut latest: HashMap<i64, chrono::DateTime<Utc>> = HashMap::new();
        for record in records {
            latest
                .entry(record.website_id)
                .and_modify(|t| *t = (*t).max(record.timestamp))
                .or_insert(record.timestamp);
        }

        for (website_id, timestamp) in latest {
            if let Err(e) = sqlx::query(
                "UPDATE websites SET last_activity_at = GREATEST(COALESCE(last_activity_at, ?), ?) WHERE id = ?",
            )
            .bind(timestamp)
            .bind(timestamp)
            .bind(website_id)
            .execute(self.pool.inner())
            .await
            {
                tracing::warn!(website_id, error = %e, "failed to update last_activity_at");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_outcome_serializes_with_expected_fields() {
        let outcome = IngestOutcome { status: "ok", received: 3, processed: 2 };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["received"], 3);
        assert_eq!(json["processed"], 2);
    }
}
