//! Shared application state injected into every handler via `axum::State`.

use crate::cache::{LookupCaches, WebsiteCache};
use crate::config::Config;
use crate::db::pool::DbPool;
use crate::ingest::IngestService;
use crate::ratelimit::RateLimiter;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub ingest: IngestService,
    pub websites: Arc<WebsiteCache>,
    pub lookups: Arc<LookupCaches>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
