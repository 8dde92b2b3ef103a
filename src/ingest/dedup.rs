//! Receiver-side batch deduplication for upstream-forwarded ingests.
//!
//! Uniqueness key is `(batch_uuid, source_instance)`. A replayed POST of an
//! already-recorded pair is a benign success: the receiver reports the
//! previously-recorded counts without touching `log_records` again.
//!
//! The check, the bulk insert, and the dedup row must commit atomically —
//! otherwise two concurrent POSTs of the same pair can both observe
//! [`DedupCheck::New`], both insert into `log_records`, and only one of the
//! two `batch_deduplication` inserts survives the unique-key collision,
//! leaving duplicate log rows behind a single dedup row. `check` takes
//! `SELECT ... FOR UPDATE` inside the caller's transaction so the second
//! concurrent transaction blocks until the first commits or rolls back,
//! then observes the now-visible dedup row instead of racing past it.

use crate::db::models::BatchUuid;
use crate::error::DbError;
use sqlx::{MySql, Transaction};

/// Outcome of consulting the dedup table before an upstream-forwarded
/// insert.
pub enum DedupCheck {
    /// Not seen before; caller should proceed with the insert and then
    /// call [`record`] before committing the same transaction.
    New,
    /// Already recorded; caller should short-circuit with the recorded
    /// counts and skip the insert entirely.
    Replay { record_count: i64 },
}

/// Consults `batch_deduplication` for `(batch_uuid, source_instance)`,
/// locking the row (if any) for the lifetime of `tx` so a concurrent
/// transaction checking the same pair blocks here rather than racing ahead.
pub async fn check(
    tx: &mut Transaction<'_, MySql>,
    batch_uuid: BatchUuid,
    source_instance: &str,
) -> Result<DedupCheck, DbError> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT record_count FROM batch_deduplication WHERE batch_uuid = ? AND source_instance = ? FOR UPDATE",
    )
    .bind(batch_uuid.as_bytes().to_vec())
    .bind(source_instance)
    .fetch_optional(&mut **tx)
    .await
    .map_err(DbError::Sqlx)?;

    Ok(match existing {
        Some(record_count) => DedupCheck::Replay { record_count },
        None => DedupCheck::New,
    })
}

/// Records a freshly-accepted batch so future replays of the same pair are
/// recognized. Must be called inside the same transaction as the bulk
/// insert, before it commits.
pub async fn record(
    tx: &mut Transaction<'_, MySql>,
    batch_uuid: BatchUuid,
    source_instance: &str,
    record_count: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO batch_deduplication (batch_uuid, source_instance, record_count) VALUES (?, ?, ?)",
    )
    .bind(batch_uuid.as_bytes().to_vec())
    .bind(source_instance)
    .bind(record_count)
    .execute(&mut **tx)
    .await
    .map_err(DbError::Sqlx)?;

    Ok(())
}
