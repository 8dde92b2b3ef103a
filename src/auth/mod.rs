//! Bearer API-key authentication.
//!
//! No SSO, MFA, RBAC, or session state — a machine-to-machine
//! log-ingestion API needs exactly one mechanism: a static, bcrypt-hashed
//! API key presented as `Authorization: Bearer <key>`. Pure validation
//! functions are kept separate from the database-touching parts so the
//! header-shape logic stays cheap to unit test without a connection.

use crate::db::pool::DbPool;
use crate::error::AuthError;

/// A 40-character key drawn from `[A-Za-z0-9]`, matching the format the
/// provisioning side of this system issues (out of scope here — this module
/// only covers verification).
const API_KEY_LEN: usize = 40;

fn is_well_formed(key: &str) -> bool {
    key.len() == API_KEY_LEN && key.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Extracts the bearer token from an `Authorization` header value.
/// The scheme match is case-sensitive per RFC 6750's conventional usage,
/// and matches how the upstream producer side of this system emits it.
pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, AuthError> {
    let value = header_value.ok_or(AuthError::MissingHeader)?;
    value.strip_prefix("Bearer ").filter(|token| !token.is_empty()).ok_or(AuthError::MissingHeader)
}

/// Verifies `token` against every active API key's bcrypt hash and, on
/// success, fires off a best-effort `last_used_at` bump. Every active hash
/// is checked (there is no cheap way to look a bcrypt hash up by plaintext)
/// but bcrypt's own cost factor keeps this from being a throughput problem
/// at the key volumes this system expects.
pub async fn authenticate(pool: &DbPool, token: &str) -> Result<i64, AuthError> {
    if !is_well_formed(token) {
        return Err(AuthError::InvalidToken);
    }

    let keys: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, key_hash FROM api_keys WHERE is_active = TRUE")
            .fetch_all(pool.inner())
            .await
            .map_err(crate::error::DbError::Sqlx)?;

    for (id, hash) in keys {
        if bcrypt::verify(token, &hash).unwrap_or(false) {
            touch_last_used(pool, id);
            return Ok(id);
        }
    }

    Err(AuthError::InvalidToken)
}

/// Fire-and-forget: an authentication failure here must never fail the
/// request it is piggy-backing on.
fn touch_last_used(pool: &DbPool, key_id: i64) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = ?")
            .bind(key_id)
            .execute(pool.inner())
            .await
        {
            tracing::warn!(key_id, error = %e, "failed to update api key last_used_at");
        }
    });
}

/// Hashes a plaintext key at bcrypt cost 12, for use by provisioning tooling
/// and tests — not exercised on the request path.
pub fn hash_key(plaintext: &str) -> Result<String, AuthError> {
    bcrypt::hash(plaintext, 12)
        .map_err(|e| AuthError::Db(crate::error::DbError::Query(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_key_is_40_alphanumeric_chars() {
        assert!(is_well_formed(&"a".repeat(40)));
        assert!(!is_well_formed(&"a".repeat(39)));
        assert!(!is_well_formed("not-alphanumeric-----------------------"));
    }

    #[test]
    fn extract_bearer_token_requires_the_exact_scheme() {
        assert!(extract_bearer_token(Some("Bearer abc123")).is_ok());
        assert!(extract_bearer_token(Some("bearer abc123")).is_err());
        assert!(extract_bearer_token(Some("Basic abc123")).is_err());
        assert!(extract_bearer_token(None).is_err());
        assert!(extract_bearer_token(Some("Bearer ")).is_err());
    }

    #[test]
    fn hash_key_round_trips_through_bcrypt_verify() {
        let key = "k".repeat(40);
        let hash = hash_key(&key).unwrap();
        assert!(bcrypt::verify(&key, &hash).unwrap());
        assert!(!bcrypt::verify("wrong", &hash).unwrap());
    }
}
