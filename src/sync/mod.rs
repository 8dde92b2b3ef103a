//! Hierarchical upstream sync: a worker-zero-only background task that
//! forwards not-yet-archived records to a parent aggregator.

pub mod worker;

pub use worker::SyncWorker;
