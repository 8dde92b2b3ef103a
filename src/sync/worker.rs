//! The upstream sync worker: periodically assembles a batch of
//! not-yet-archived records, POSTs them to a parent aggregator, and marks
//! them archived only once the parent has acknowledged receipt.
//!
//! A single `tokio::spawn`ed supervisor driven by an interval, watching a
//! shutdown channel, with `reqwest` for the outbound POST.

use crate::cluster::NodeIdentity;
use crate::config::UpstreamConfig;
use crate::db::models::{BatchStatus, BatchUuid};
use crate::db::pool::DbPool;
use chrono::Utc;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const MAX_UUID_COLLISION_RETRIES: u32 = 5;

/// A row fetched by the cycle query, carrying just enough to build the
/// outbound payload and the archival UPDATE afterward.
#[derive(Debug, sqlx::FromRow)]
struct UnarchivedRow {
    id: i64,
    raw_data: serde_json::Value,
}

pub struct SyncWorker {
    pool: DbPool,
    config: UpstreamConfig,
    node: NodeIdentity,
    client: reqwest::Client,
    source_instance: String,
    current_batch_size: AtomicU64,
}

impl SyncWorker {
    pub fn new(pool: DbPool, config: UpstreamConfig, node: NodeIdentity, source_instance: String) -> Arc<Self> {
        let current_batch_size = AtomicU64::new(config.batch_size);
        Arc::new(Self {
            pool,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client construction"),
            config,
            node,
            source_instance,
            current_batch_size,
        })
    }

    /// Runs the periodic sync loop until `shutdown` fires, finishing any
    /// in-flight cycle before exiting.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.reconcile_stale_batches().await {
            tracing::warn!(error = %e, "failed to reconcile stale in-progress sync batches at startup");
        }

        let mut interval = tokio::time::interval(self.config.batch_interval);
        interval.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.node.is_worker_zero() {
                        continue;
                    }
                    if let Err(e) = self.run_cycle().await {
                        tracing::warn!(error = %e, "upstream sync cycle failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("upstream sync worker shutting down");
                    break;
                }
            }
        }
    }

    /// On restart, any batch still `in_progress` belongs to a prior process
    /// that died mid-cycle; recovering it as `failed` re-queues its rows
    /// under a fresh uuid next cycle rather than leaving them stuck.
    async fn reconcile_stale_batches(&self) -> Result<(), sqlx::Error> {
        let horizon = Utc::now() - chrono::Duration::seconds(60);
        sqlx::query(
            "UPDATE upstream_sync_batches SET status = 'failed', error_message = 'reclaimed on restart' \
             WHERE status = 'in_progress' AND started_at < ?",
        )
        .bind(horizon)
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    async fn run_cycle(&self) -> Result<(), sqlx::Error> {
        let limit = self.current_batch_size.load(Ordering::Acquire) as i64;

        let rows: Vec<UnarchivedRow> = sqlx::query_as(
            "SELECT id, raw_data FROM log_records WHERE archived_at IS NULL ORDER BY id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool.inner())
        .await?;

        if rows.is_empty() {
            return Ok(());
        }

        let batch_uuid = self.insert_pending_batch(rows.len() as i64).await?;
        let payload: Vec<&serde_json::Value> = rows.iter().map(|r| &r.raw_data).collect();

        match self.post_batch(batch_uuid, &payload).await {
            Ok(()) => {
                let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
                self.archive_rows(&ids, batch_uuid).await?;
                self.finalize_batch(batch_uuid, BatchStatus::Completed, None, rows.len() as i64).await?;
                self.grow_batch_size();
            }
            Err(e) => {
                self.finalize_batch(batch_uuid, BatchStatus::Failed, Some(e.to_string()), 0).await?;
                self.shrink_batch_size();
            }
        }

        Ok(())
    }

    async fn insert_pending_batch(&self, record_count: i64) -> Result<BatchUuid, sqlx::Error> {
        for _ in 0..MAX_UUID_COLLISION_RETRIES {
            let uuid = BatchUuid::new_random();
            let result = sqlx::query(
                "INSERT INTO upstream_sync_batches (batch_uuid, status, record_count) VALUES (?, 'in_progress', ?)",
            )
            .bind(uuid.as_bytes().to_vec())
            .bind(record_count)
            .execute(self.pool.inner())
            .await;

            match result {
                Ok(_) => return Ok(uuid),
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => continue,
                Err(e) => return Err(e),
            }
        }

        // Collision five times in a row on a 128-bit random value is
        // effectively impossible; treat it as a hard failure rather than
        // looping forever.
        Err(sqlx::Error::Protocol("batch_uuid collision retries exhausted".into()))
    }

    async fn post_batch(&self, batch_uuid: BatchUuid, payload: &[&serde_json::Value]) -> Result<(), SyncPostError> {
        let body = serde_json::to_vec(payload).map_err(|e| SyncPostError::Encode(e.to_string()))?;

        let mut request = self
            .client
            .post(format!("{}/api/logs/batch", self.config.server.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .header("X-Batch-UUID", batch_uuid.to_string())
            .header("X-Source-Instance", &self.source_instance)
            .header("Content-Type", "application/json");

        let body = if self.config.compression {
            request = request.header("Content-Encoding", "gzip");
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&body).map_err(|e| SyncPostError::Encode(e.to_string()))?;
            encoder.finish().map_err(|e| SyncPostError::Encode(e.to_string()))?
        } else {
            body
        };

        let response = request.body(body).send().await.map_err(|e| SyncPostError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SyncPostError::Status(response.status().as_u16()))
        }
    }

    /// At-most-once archival marking: exactly the ids in this batch are
    /// updated, in one statement, never touching rows outside it.
    async fn archive_rows(&self, ids: &[i64], batch_uuid: BatchUuid) -> Result<(), sqlx::Error> {
        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let query = format!(
            "UPDATE log_records SET archived_at = NOW(), upstream_batch_uuid = ? WHERE id IN ({})",
            placeholders.join(", ")
        );

        let mut stmt = sqlx::query(&query).bind(batch_uuid.as_bytes().to_vec());
        for id in ids {
            stmt = stmt.bind(id);
        }
        stmt.execute(self.pool.inner()).await?;

        Ok(())
    }

    async fn finalize_batch(
        &self,
        batch_uuid: BatchUuid,
        status: BatchStatus,
        error_message: Option<String>,
        record_count: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upstream_sync_batches SET status = ?, completed_at = NOW(), error_message = ?, record_count = ? \
             WHERE batch_uuid = ?",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(record_count)
        .bind(batch_uuid.as_bytes().to_vec())
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }

    /// Recover by the configured step toward the target, never overshooting
    /// it.
    fn grow_batch_size(&self) {
        self.current_batch_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current + self.config.batch_size_recovery).min(self.config.batch_size))
            })
            .ok();
    }

    /// Halve, clamped at the configured minimum.
    fn shrink_batch_size(&self) {
        self.current_batch_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current / 2).max(self.config.batch_size_min))
            })
            .ok();
    }

    #[cfg(test)]
    fn batch_size(&self) -> u64 {
        self.current_batch_size.load(Ordering::Acquire)
    }
}

#[derive(Debug, thiserror::Error)]
enum SyncPostError {
    #[error("failed to encode batch: {0}")]
    Encode(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::NodeIdentity;

    fn config() -> UpstreamConfig {
        UpstreamConfig {
            server: "http://localhost:9999".to_string(),
            api_key: "k".repeat(40),
            batch_size: 1000,
            batch_interval: Duration::from_secs(30),
            batch_size_min: 100,
            batch_size_recovery: 500,
            compression: true,
        }
    }

    fn worker_with_size(size: u64) -> Arc<SyncWorker> {
        let worker = SyncWorker::new(
            DbPool::test_stub(),
            config(),
            NodeIdentity::test_worker_zero(),
            "test-instance".to_string(),
        );
        worker.current_batch_size.store(size, Ordering::Relaxed);
        worker
    }

    #[test]
    fn shrink_halves_and_clamps_at_minimum() {
        let worker = worker_with_size(200);
        worker.shrink_batch_size();
        assert_eq!(worker.batch_size(), 100);
        worker.shrink_batch_size();
        assert_eq!(worker.batch_size(), 100, "must clamp at batch_size_min");
    }

    #[test]
    fn grow_steps_toward_target_without_overshoot() {
        let worker = worker_with_size(100);
        worker.grow_batch_size();
        assert_eq!(worker.batch_size(), 600);
        worker.grow_batch_size();
        assert_eq!(worker.batch_size(), 1000, "must clamp at the configured target");
    }
}
