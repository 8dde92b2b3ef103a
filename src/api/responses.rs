//! Response and request payload shapes for the HTTP surface.

use crate::db::models::Website;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime: u64,
    pub db: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WebsiteListResponse {
    pub websites: Vec<Website>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListWebsitesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListWebsitesQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// `PUT /api/websites/:domain` body — every field optional, only the
/// supplied ones are updated.
#[derive(Debug, Deserialize)]
pub struct UpdateWebsiteRequest {
    pub is_ssl: Option<bool>,
    pub is_dev: Option<bool>,
    pub owner_email: Option<String>,
    pub admin_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchIngestResponse {
    pub status: &'static str,
    pub received: usize,
    pub processed: usize,
}
