//! The header-shape half of bearer authentication (the DB-backed half —
//! "known-active key ⇒ 200 and last_used_at monotonic" — needs a live
//! MariaDB instance and is exercised by the crate's own `#[sqlx::test]`-style
//! suite, not here).

use logvault::auth::{extract_bearer_token, hash_key};

#[test]
fn missing_authorization_header_is_rejected() {
    assert!(extract_bearer_token(None).is_err());
}

#[test]
fn non_bearer_schemes_are_rejected() {
    assert!(extract_bearer_token(Some("Basic dXNlcjpwYXNz")).is_err());
    assert!(extract_bearer_token(Some("Digest abc")).is_err());
}

#[test]
fn scheme_match_is_case_sensitive() {
    assert!(extract_bearer_token(Some("bearer abc123")).is_err());
    assert!(extract_bearer_token(Some("BEARER abc123")).is_err());
}

#[test]
fn well_formed_bearer_header_yields_the_token() {
    let key = "a".repeat(40);
    let header = format!("Bearer {key}");
    assert_eq!(extract_bearer_token(Some(&header)).unwrap(), key);
}

#[test]
fn hashed_keys_never_verify_against_the_wrong_plaintext() {
    let correct = "x".repeat(40);
    let wrong = "y".repeat(40);
    let hash = hash_key(&correct).unwrap();
    assert!(bcrypt::verify(&correct, &hash).unwrap());
    assert!(!bcrypt::verify(&wrong, &hash).unwrap());
}
