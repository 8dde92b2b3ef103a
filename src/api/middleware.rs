//! HTTP middleware: pre-auth rate limiting and bearer authentication.
//!
//! Two `tower` `from_fn_with_state` functions wired in front of the router,
//! each handling exactly one concern — no JWT/session/RBAC machinery here.

use crate::api::state::AppState;
use crate::auth;
use crate::error::AppError;
use crate::ratelimit::Decision;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

/// Rejects requests over the configured per-IP rate before any DB work
/// (including the bcrypt scan in [`auth_middleware`]) is ever attempted.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.rate_limiter.check(addr.ip()) {
        Decision::Allowed => Ok(next.run(request).await),
        Decision::Denied { .. } => Err(AppError::RateLimited),
    }
}

/// Validates the `Authorization` header against active API keys.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = auth::extract_bearer_token(header_value)?;
    auth::authenticate(&state.pool, token).await?;
    Ok(next.run(request).await)
}
