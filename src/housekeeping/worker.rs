//! The two retention jobs themselves. Each is a standalone,
//! idempotent async function — the scheduler in [`super::scheduler`] is
//! responsible for cadence, overlap prevention, and the worker-zero gate.

use crate::config::RetentionConfig;
use crate::db::pool::DbPool;
use chrono::{Duration, Utc};

/// Deletes `log_records` older than `LOG_RETENTION_DAYS`. When upstream
/// forwarding is configured, unarchived rows are exempt regardless of age —
/// they must survive until a sync cycle archives them, however long that
/// takes across an outage.
pub async fn purge_old_logs(pool: &DbPool, retention: &RetentionConfig, upstream_enabled: bool) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(retention.log_retention_days);

    let result = if upstream_enabled {
        sqlx::query("DELETE FROM log_records WHERE created_at < ? AND archived_at IS NOT NULL")
            .bind(cutoff)
            .execute(pool.inner())
            .await?
    } else {
        sqlx::query("DELETE FROM log_records WHERE created_at < ?")
            .bind(cutoff)
            .execute(pool.inner())
            .await?
    };

    Ok(result.rows_affected())
}

/// Deletes `websites` whose `last_activity_at` is older than
/// `INACTIVE_WEBSITE_DAYS`; the `ON DELETE CASCADE` foreign key on
/// `log_records.website_id` removes their log records as part of the same
/// statement.
pub async fn purge_inactive_websites(pool: &DbPool, retention: &RetentionConfig) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(retention.inactive_website_days);

    let result = sqlx::query("DELETE FROM websites WHERE last_activity_at IS NOT NULL AND last_activity_at < ?")
        .bind(cutoff)
        .execute(pool.inner())
        .await?;

    Ok(result.rows_affected())
}
