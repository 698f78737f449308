//! Per-client request throttling.
//!
//! Sliding window: each client key keeps the instants of its admitted
//! requests, entries older than the window are dropped on every check, and a
//! request is refused once the window already holds `max_requests` entries.
//! Refused requests are not recorded, so a client that backs off regains its
//! budget as old entries age out.

use crate::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A request refused by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    /// How long until the oldest counted request leaves the window
    pub retry_after: Duration,
}

/// Sliding-window limiter keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    /// Map of client key -> admitted request instants, oldest first
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Allow `max_requests` per client in any `window`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `key`, or refuse it if the window is full.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] when `key` already used its budget.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimited> {
        self.check_and_record_at(key, Instant::now())
    }

    fn check_and_record_at(&self, key: &str, now: Instant) -> Result<(), RateLimited> {
        // A panic elsewhere cannot leave the map half-updated.
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamps = attempts.entry(key.to_string()).or_default();
        while timestamps
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.window)
        {
            timestamps.pop_front();
        }

        let max = usize::try_from(self.max_requests).unwrap_or(usize::MAX);
        if timestamps.len() >= max {
            let retry_after = timestamps.front().map_or(self.window, |oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(*oldest))
            });

            tracing::warn!(
                rate_limit_exceeded = true,
                key = %key,
                attempts = timestamps.len() + 1,
                max_requests = self.max_requests,
                window_ms = self.window.as_millis(),
                "Rate limit exceeded"
            );

            return Err(RateLimited { retry_after });
        }

        timestamps.push_back(now);

        tracing::trace!(
            key = %key,
            attempts = timestamps.len(),
            max_requests = self.max_requests,
            "Rate limit check passed"
        );

        Ok(())
    }

    /// Forget every request counted for `key`.
    pub fn reset(&self, key: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Requests from `key` currently counted against its budget.
    #[must_use]
    pub fn attempts(&self, key: &str) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, VecDeque::len)
    }
}

/// The limits the HTTP server applies.
///
/// `None` disables that limit.
#[derive(Debug, Default)]
pub struct RateLimits {
    /// Budget shared by every route except the sale status endpoint
    pub general: Option<RateLimiter>,
    /// Additional budget for purchase attempts
    pub purchase: Option<RateLimiter>,
}

impl RateLimits {
    /// Build the limiters described by `config`.
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            general: Some(RateLimiter::new(
                config.max_requests,
                Duration::from_millis(config.window_ms),
            )),
            purchase: Some(RateLimiter::new(
                config.purchase_max_requests,
                Duration::from_millis(config.purchase_window_ms),
            )),
        }
    }

    /// No throttling at all.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            general: None,
            purchase: None,
        }
    }
}
