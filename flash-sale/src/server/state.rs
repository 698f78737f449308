//! Application state for the flash sale HTTP server.

use super::cache::StatusCache;
use super::rate_limit::RateLimits;
use crate::identity::IdentityRegistry;
use crate::service::FlashSale;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// The sale
    pub sale: FlashSale,
    /// Logged-in users
    pub identities: Arc<IdentityRegistry>,
    /// Cached status response
    pub status_cache: Arc<StatusCache>,
    /// Per-client request limits
    pub rate_limits: Arc<RateLimits>,
    /// When the server started, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create a new application state with rate limiting disabled.
    #[must_use]
    pub fn new(
        sale: FlashSale,
        identities: Arc<IdentityRegistry>,
        status_cache: Arc<StatusCache>,
    ) -> Self {
        Self {
            sale,
            identities,
            status_cache,
            rate_limits: Arc::new(RateLimits::disabled()),
            started_at: Instant::now(),
        }
    }

    /// Throttle requests with `rate_limits`.
    #[must_use]
    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = Arc::new(rate_limits);
        self
    }
}
