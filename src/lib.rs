//! # logvault - centralized log aggregation server
//!
//! Ingests parsed web-server access/error log records from edge agents,
//! normalizes and deduplicates hot fields, persists them into a hybrid
//! relational/JSON store, and — in hierarchical deployments — forwards
//! not-yet-archived records to an upstream aggregator with idempotent
//! batch semantics. A housekeeping scheduler enforces retention.
//!
//! ## Modules
//!
//! - `config`: process-wide configuration read once from the environment
//! - `error`: the crate-wide error enums and the HTTP error-response shape
//! - `cluster`: the worker-zero identity used to gate singleton tasks
//! - `db`: the connection pool, migration runner, and row types
//! - `cache`: in-process find-or-create caches (websites, hosts, HTTP codes)
//! - `auth`: bearer API-key authentication
//! - `ratelimit`: pre-auth, per-IP leaky-bucket rate limiting
//! - `ingest`: the ingestion pipeline and receiver-side batch deduplication
//! - `sync`: the upstream sync worker
//! - `housekeeping`: the retention scheduler
//! - `api`: the HTTP surface

#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod db;
pub mod error;
pub mod housekeeping;
pub mod ingest;
pub mod ratelimit;
pub mod sync;

/// Crate version, exposed for the `/health` endpoint and log lines at boot.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, exposed alongside [`VERSION`].
pub const NAME: &str = env!("CARGO_PKG_NAME");
