//! The wire shape of an incoming log record and the pure parsing
//! helpers that turn it into a [`crate::db::models::NormalizedRecord`].

use crate::db::models::LogType;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The named fields the pipeline extracts from an element of the ingest
/// body's JSON array. The element itself (not just these fields) becomes
/// `raw_data` — the data model preserves the full original object verbatim,
/// named fields included, so this struct exists purely for extraction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLogRecord {
    pub source_file: Option<String>,
    pub host: Option<String>,
    #[serde(alias = "timestamp")]
    pub log_timestamp: Option<serde_json::Value>,
    pub remote: Option<String>,
    pub client: Option<String>,
    pub code: Option<String>,
}

impl RawLogRecord {
    /// Extracts the named fields from a parsed JSON element without
    /// consuming it — the caller keeps the original `Value` for `raw_data`.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Reason a record was rejected, for the per-record skip-and-log path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    MissingSourceFile,
    MalformedSourceFile,
    MissingHost,
    LookupFailed(String),
}

impl std::fmt::Display for RecordRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordRejection::MissingSourceFile => write!(f, "missing source_file"),
            RecordRejection::MalformedSourceFile => write!(f, "malformed source_file"),
            RecordRejection::MissingHost => write!(f, "missing host"),
            RecordRejection::LookupFailed(e) => write!(f, "lookup failed: {e}"),
        }
    }
}

/// Parses `source_file` of the form `.../<domain>/log/<access|error>.log`
/// into `(domain, log_type)`. The domain is the path segment immediately
/// preceding `/log/`; any suffix other than `access.log`/`error.log` is
/// classified as an error log by default.
pub fn parse_source_file(source_file: &str) -> Result<(String, LogType), RecordRejection> {
    let marker = "/var/www/";
    let after_marker = source_file.find(marker).map(|i| &source_file[i + marker.len()..]);

    let after_marker = after_marker.ok_or(RecordRejection::MalformedSourceFile)?;
    let domain = after_marker.split('/').next().filter(|s| !s.is_empty());
    let domain = domain.ok_or(RecordRejection::MalformedSourceFile)?;

    let log_type = if source_file.ends_with("/access.log") {
        LogType::Access
    } else {
        LogType::Error
    };

    Ok((domain.to_string(), log_type))
}

/// Resolves `remote`/`client`: prefer `remote` verbatim; otherwise
/// take `client` and strip a trailing `:<port>` suffix, but only when the
/// remainder after the last `:` parses as a port number — an unbracketed
/// IPv6 literal is full of colons and must pass through untouched.
pub fn resolve_remote(remote: Option<&str>, client: Option<&str>) -> Option<String> {
    if let Some(remote) = remote {
        return Some(remote.to_string());
    }

    let client = client?;
    match client.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => Some(host.to_string()),
        _ => Some(client.to_string()),
    }
}

/// Parses `log_timestamp` (ISO-8601 string or numeric epoch seconds) into a
/// UTC timestamp, defaulting to `now` when absent or unparsable.
pub fn resolve_timestamp(value: Option<&serde_json::Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    match value {
        Some(serde_json::Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(now),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_access_log_path() {
        let (domain, log_type) =
            parse_source_file("/var/www/example.com/log/access.log").unwrap();
        assert_eq!(domain, "example.com");
        assert_eq!(log_type, LogType::Access);
    }

    #[test]
    fn parses_well_formed_error_log_path() {
        let (domain, log_type) = parse_source_file("/var/www/example.com/log/error.log").unwrap();
        assert_eq!(domain, "example.com");
        assert_eq!(log_type, LogType::Error);
    }

    #[test]
    fn unrecognized_suffix_defaults_to_error_log() {
        let (_, log_type) = parse_source_file("/var/www/example.com/log/custom.log").unwrap();
        assert_eq!(log_type, LogType::Error);
    }

    #[test]
    fn rejects_path_without_var_www_marker() {
        assert_eq!(
            parse_source_file("/srv/example.com/log/access.log"),
            Err(RecordRejection::MalformedSourceFile)
        );
    }

    #[test]
    fn rejects_path_with_empty_domain_segment() {
        assert_eq!(
            parse_source_file("/var/www//log/access.log"),
            Err(RecordRejection::MalformedSourceFile)
        );
    }

    #[test]
    fn resolve_remote_prefers_remote_field() {
        assert_eq!(
            resolve_remote(Some("10.0.0.1"), Some("10.0.0.2:443")),
            Some("10.0.0.1".to_string())
        );
    }

    #[test]
    fn resolve_remote_strips_port_from_client_when_valid() {
        assert_eq!(resolve_remote(None, Some("10.0.0.2:443")), Some("10.0.0.2".to_string()));
    }

    #[test]
    fn resolve_remote_leaves_unbracketed_ipv6_untouched() {
        // Trailing segment after the last ':' is not a valid port, so the
        // literal passes through whole rather than being mis-split.
        let ipv6 = "2001:db8::1";
        assert_eq!(resolve_remote(None, Some(ipv6)), Some(ipv6.to_string()));
    }

    #[test]
    fn resolve_remote_is_none_when_both_absent() {
        assert_eq!(resolve_remote(None, None), None);
    }

    #[test]
    fn resolve_timestamp_falls_back_to_now_when_absent() {
        let now = Utc::now();
        assert_eq!(resolve_timestamp(None, now), now);
    }

    #[test]
    fn resolve_timestamp_parses_rfc3339_string() {
        let now = Utc::now();
        let value = serde_json::json!("2024-01-01T00:00:00Z");
        let parsed = resolve_timestamp(Some(&value), now);
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn resolve_timestamp_parses_numeric_epoch_seconds() {
        let now = Utc::now();
        let value = serde_json::json!(1_700_000_000);
        let parsed = resolve_timestamp(Some(&value), now);
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }
}
