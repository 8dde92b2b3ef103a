//! The HTTP surface: 7 endpoints over axum, with bearer auth and
//! pre-auth rate limiting as tower middleware.

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
