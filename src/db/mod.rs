//! Database layer: a bounded connection pool, the versioned schema
//! migration runner, and the row types shared by the rest of the crate.

pub mod migrations;
pub mod models;
pub mod pool;

pub use pool::DbPool;
