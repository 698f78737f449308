//! HTTP server for the flash sale.

/// Status response cache
pub mod cache;
/// HTTP error type
pub mod error;
/// Health endpoint
pub mod health;
/// Rate limit and security header middleware
pub mod middleware;
/// Per-client request throttling
pub mod rate_limit;
/// Router
pub mod routes;
/// Shared handler state
pub mod state;

pub use routes::{build_router, with_middleware};
pub use rate_limit::RateLimits;
pub use state::AppState;
