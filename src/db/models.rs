//! Row types for the hybrid relational/JSON log store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `log_type` column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Access,
    Error,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Access => "access",
            LogType::Error => "error",
        }
    }
}

impl std::str::FromStr for LogType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(LogType::Access),
            "error" => Ok(LogType::Error),
            _ => Err(()),
        }
    }
}

/// A `websites` row.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Website {
    pub id: i64,
    pub domain: String,
    pub is_ssl: bool,
    pub is_dev: bool,
    pub owner_email: Option<String>,
    pub admin_email: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sentinel HTTP code id for "not applicable" (error logs with no status).
pub const HTTP_CODE_NA_ID: i32 = 0;
pub const HTTP_CODE_NA: &str = "N/A";

/// An `upstream_sync_batches` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

/// A single ingestible record after normalization, ready for the bulk
/// INSERT. `raw_data` retains the original payload verbatim.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub website_id: i64,
    pub log_type: LogType,
    pub timestamp: DateTime<Utc>,
    pub host_id: i32,
    pub code_id: i32,
    pub remote: Option<String>,
    pub raw_data: serde_json::Value,
}

/// 128-bit batch identifiers are stored as `BINARY(16)`; this newtype keeps
/// the byte <-> `Uuid` conversion in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchUuid(pub Uuid);

impl BatchUuid {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(bytes).ok().map(|b| Self(Uuid::from_bytes(b)))
    }
}

impl std::fmt::Display for BatchUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
