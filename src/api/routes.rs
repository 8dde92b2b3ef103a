//! Router assembly: the 7 endpoints, wired with the rate-limit and auth
//! middleware in an order that matters — rate limiting runs before the
//! bearer-token check ever touches the database.

use crate::api::handlers::{
    delete_website, get_website, health, ingest_batch, ingest_logs, list_websites, update_website,
};
use crate::api::middleware::{auth_middleware, cors_layer, rate_limit_middleware};
use crate::api::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Wire-size cap before gzip inflation; the decompressed cap is enforced
/// inside the ingest handlers.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logs", post(ingest_logs))
        .route("/logs/batch", post(ingest_batch))
        .route("/websites", get(list_websites))
        .route("/websites/:domain", get(get_website).put(update_website).delete(delete_website))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api", protected)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}
