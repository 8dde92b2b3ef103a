//! Request handlers for the HTTP surface.

use crate::api::responses::{
    BatchIngestResponse, HealthResponse, ListWebsitesQuery, UpdateWebsiteRequest, WebsiteListResponse,
};
use crate::api::state::AppState;
use crate::db::models::BatchUuid;
use crate::error::{AppError, IngestError};
use crate::ingest::dedup::{self, DedupCheck};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::io::Read;
use std::sync::Arc;

/// Decompressed-body cap: 10 MB after gzip inflation, enforced
/// manually because the wire-size cap (`RequestBodyLimitLayer`) only bounds
/// the compressed bytes.
const MAX_DECOMPRESSED_BODY: usize = 10 * 1024 * 1024;

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Decodes the raw request body into a JSON array of log record objects,
/// handling optional gzip framing and the decompressed-size cap.
fn decode_body(bytes: Bytes, headers: &HeaderMap) -> Result<Vec<serde_json::Value>, IngestError> {
    let decompressed = if is_gzip(headers) {
        let mut decoder = flate2::read::GzDecoder::new(bytes.as_ref());
        let mut buf = Vec::with_capacity(bytes.len() * 4);
        let mut limited = (&mut decoder).take((MAX_DECOMPRESSED_BODY + 1) as u64);
        limited.read_to_end(&mut buf).map_err(|e| IngestError::Decompression(e.to_string()))?;
        buf
    } else {
        bytes.to_vec()
    };

    if decompressed.len() > MAX_DECOMPRESSED_BODY {
        return Err(IngestError::BodyTooLarge);
    }

    let value: serde_json::Value =
        serde_json::from_slice(&decompressed).map_err(|e| IngestError::MalformedJson(e.to_string()))?;

    match value {
        serde_json::Value::Array(elements) => Ok(elements),
        _ => Err(IngestError::MalformedJson("expected a top-level JSON array".to_string())),
    }
}

/// `POST /api/logs`
pub async fn ingest_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BatchIngestResponse>, AppError> {
    let elements = decode_body(body, &headers)?;
    let outcome = state.ingest.ingest(elements).await?;
    Ok(Json(BatchIngestResponse { status: outcome.status, received: outcome.received, processed: outcome.processed }))
}

/// `POST /api/logs/batch` — the receiver side of hierarchical upstream sync.
/// Requires `X-Batch-UUID` and `X-Source-Instance` headers; a replay of a
/// previously-seen pair is a benign success, not an error.
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BatchIngestResponse>, AppError> {
    let batch_uuid_header = headers
        .get("X-Batch-UUID")
        .and_then(|v| v.to_str().ok())
        .ok_or(IngestError::MissingHeader("X-Batch-UUID"))?;
    let source_instance = headers
        .get("X-Source-Instance")
        .and_then(|v| v.to_str().ok())
        .ok_or(IngestError::MissingHeader("X-Source-Instance"))?;

    let batch_uuid = uuid::Uuid::parse_str(batch_uuid_header)
        .ok()
        .map(BatchUuid)
        .ok_or_else(|| IngestError::MalformedJson("X-Batch-UUID is not a valid UUID".to_string()))?;

    let mut tx = state.pool.inner().begin().await.map_err(|e| IngestError::Db(crate::error::DbError::Sqlx(e)))?;

    match dedup::check(&mut tx, batch_uuid, source_instance).await.map_err(IngestError::Db)? {
        DedupCheck::Replay { record_count } => {
            tx.rollback().await.map_err(|e| IngestError::Db(crate::error::DbError::Sqlx(e)))?;
            Ok(Json(BatchIngestResponse {
                status: "ok",
                received: record_count as usize,
                processed: record_count as usize,
            }))
        }
        DedupCheck::New => {
            let elements = decode_body(body, &headers)?;
            let received = elements.len();
            let outcome = state.ingest.ingest_within_tx(&mut tx, elements).await?;
            dedup::record(&mut tx, batch_uuid, source_instance, outcome.processed as i64)
                .await
                .map_err(IngestError::Db)?;
            tx.commit().await.map_err(|e| IngestError::Db(crate::error::DbError::Sqlx(e)))?;
            Ok(Json(BatchIngestResponse { status: "ok", received, processed: outcome.processed }))
        }
    }
}

/// `GET /api/websites`
pub async fn list_websites(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListWebsitesQuery>,
) -> Result<Json<WebsiteListResponse>, AppError> {
    let limit = query.limit();
    let offset = query.offset();

    let websites = sqlx::query_as::<_, crate::db::models::Website>(
        "SELECT * FROM websites ORDER BY id ASC LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(state.pool.inner())
    .await
    .map_err(crate::error::DbError::Sqlx)?;

    Ok(Json(WebsiteListResponse { websites, limit, offset }))
}

/// `GET /api/websites/:domain`
pub async fn get_website(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<crate::db::models::Website>, AppError> {
    let website = state.websites.get_by_domain(&state.pool, &domain).await?;
    website.map(Json).ok_or(AppError::NotFound)
}

/// `PUT /api/websites/:domain`
pub async fn update_website(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
    Json(body): Json<UpdateWebsiteRequest>,
) -> Result<Json<crate::db::models::Website>, AppError> {
    let existing = state.websites.get_by_domain(&state.pool, &domain).await?.ok_or(AppError::NotFound)?;

    let is_ssl = body.is_ssl.unwrap_or(existing.is_ssl);
    let is_dev = body.is_dev.unwrap_or(existing.is_dev);
    let owner_email = body.owner_email.or(existing.owner_email);
    let admin_email = body.admin_email.or(existing.admin_email);

    sqlx::query(
        "UPDATE websites SET is_ssl = ?, is_dev = ?, owner_email = ?, admin_email = ? WHERE domain = ?",
    )
    .bind(is_ssl)
    .bind(is_dev)
    .bind(&owner_email)
    .bind(&admin_email)
    .bind(&domain)
    .execute(state.pool.inner())
    .await
    .map_err(crate::error::DbError::Sqlx)?;

    let updated = state.websites.get_by_domain(&state.pool, &domain).await?.ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// `DELETE /api/websites/:domain` — cascades to the website's log records.
pub async fn delete_website(
    State(state): State<Arc<AppState>>,
    Path(domain): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = sqlx::query("DELETE FROM websites WHERE domain = ?")
        .bind(&domain)
        .execute(state.pool.inner())
        .await
        .map_err(crate::error::DbError::Sqlx)?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    state.websites.invalidate(&domain);
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /health` — public, no auth required. Reports liveness unconditionally
/// and DB reachability via [`DbPool::health_check`]; a DB outage degrades the
/// response rather than failing the whole request, so orchestrators can tell
/// "process is up but storage is down" apart from "process is gone".
pub async fn health(State(state): State<Arc<AppState>>) -> (axum::http::StatusCode, Json<HealthResponse>) {
    match state.pool.health_check().await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(HealthResponse { status: "ok", uptime: state.uptime_secs(), db: "ok" }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded", uptime: state.uptime_secs(), db: "unreachable" }),
            )
        }
    }
}
