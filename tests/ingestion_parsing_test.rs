//! Domain extraction and the `client`/`remote` port-stripping rule,
//! exercised end-to-end through the public `ingest::record` helpers
//! without a database.

use logvault::db::models::LogType;
use logvault::ingest::record::{parse_source_file, resolve_remote};

#[test]
fn well_formed_access_log_path_yields_domain_and_access_type() {
    let (domain, log_type) = parse_source_file("/var/www/example.com/log/access.log").unwrap();
    assert_eq!(domain, "example.com");
    assert_eq!(log_type, LogType::Access);
}

#[test]
fn well_formed_error_log_path_yields_domain_and_error_type() {
    let (domain, log_type) = parse_source_file("/var/www/example.com/log/error.log").unwrap();
    assert_eq!(domain, "example.com");
    assert_eq!(log_type, LogType::Error);
}

#[test]
fn subdomain_form_is_preserved_as_the_domain_key() {
    let (domain, _) = parse_source_file("/var/www/blog.example.com/log/access.log").unwrap();
    assert_eq!(domain, "blog.example.com");
}

#[test]
fn malformed_paths_are_rejected_without_panicking() {
    assert!(parse_source_file("not-a-path").is_err());
    assert!(parse_source_file("/var/www//log/access.log").is_err());
    assert!(parse_source_file("/etc/nginx/example.com/access.log").is_err());
}

#[test]
fn remote_field_wins_over_client_when_both_present() {
    assert_eq!(resolve_remote(Some("203.0.113.5"), Some("198.51.100.9:8080")), Some("203.0.113.5".to_string()));
}

#[test]
fn client_port_suffix_is_stripped_when_it_is_a_valid_port() {
    assert_eq!(resolve_remote(None, Some("198.51.100.9:8080")), Some("198.51.100.9".to_string()));
}

#[test]
fn unbracketed_ipv6_client_literal_is_not_mis_split() {
    let literal = "2001:0db8:85a3:0000:0000:8a2e:0370:7334";
    assert_eq!(resolve_remote(None, Some(literal)), Some(literal.to_string()));
}
