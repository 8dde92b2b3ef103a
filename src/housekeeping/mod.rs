//! Retention housekeeping: a worker-zero-only cron-like scheduler running
//! the log-purge and inactive-website-purge jobs.

pub mod scheduler;
pub mod worker;

pub use scheduler::Scheduler;
