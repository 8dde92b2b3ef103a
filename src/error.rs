//! Crate-wide error types.
//!
//! Each functional area gets its own `thiserror` enum, and [`AppError`] is
//! the union used at the HTTP boundary so handlers can `?`-propagate
//! straight into a response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Database-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query execution error: {0}")]
    Query(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingHeader,

    #[error("invalid bearer token")]
    InvalidToken,

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

/// Ingestion errors (request-scope, not per-record; per-record errors are
/// skip-and-log and never surface here).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("expected non-empty array of log records")]
    EmptyBatch,

    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("request body exceeds the configured limit")]
    BodyTooLarge,

    #[error("failed to decompress gzip body: {0}")]
    Decompression(String),

    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

/// Top-level error that the HTTP surface understands how to render.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("resource not found")]
    NotFound,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,
}

/// Stable JSON error shape per spec: `{error:<kind>, message:<string>}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Auth(AuthError::MissingHeader | AuthError::InvalidToken) => {
                (StatusCode::UNAUTHORIZED, "unauthorized")
            }
            AppError::Auth(AuthError::Db(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            AppError::Ingest(IngestError::EmptyBatch)
            | AppError::Ingest(IngestError::MissingHeader(_))
            | AppError::Ingest(IngestError::MalformedJson(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            AppError::Ingest(IngestError::BodyTooLarge) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
            AppError::Ingest(IngestError::Decompression(_)) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            AppError::Ingest(IngestError::Db(_)) | AppError::Db(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        // Storage failures are logged with the error detail; the client
        // only ever sees a stable, generic message.
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed with a storage error");
        }

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            StatusCode::UNAUTHORIZED => "authentication required".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: kind, message })).into_response()
    }
}
