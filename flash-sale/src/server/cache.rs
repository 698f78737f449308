//! Short-lived cache for the sale status response.
//!
//! The status endpoint is polled by every open browser tab. Serving it from a
//! cache that lives for about a second keeps most polls off the sale store, and
//! the ETag lets clients skip the body entirely with `If-None-Match`.
//!
//! The cache is cleared whenever the sale changes: directly by the handlers
//! that changed it, and by [`StatusCache::spawn_invalidator`] for changes seen
//! on the sale event channel.
//!
//! Every invalidation bumps a generation counter. A reader that missed the
//! cache passes the generation it saw to [`StatusCache::put`], so a view read
//! before a change can never be stored after that change cleared the cache.

use crate::events::SaleEvent;
use crate::types::SaleView;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A cached status response
#[derive(Clone, Debug)]
pub struct CachedStatus {
    /// Entity tag of the view
    pub etag: String,
    /// The view itself
    pub view: SaleView,
    cached_at: Instant,
}

/// Status response cache with a fixed time-to-live
#[derive(Debug)]
pub struct StatusCache {
    ttl: Duration,
    entry: Mutex<Option<CachedStatus>>,
    generation: AtomicU64,
}

impl StatusCache {
    /// Cache whose entries stay fresh for `ttl`
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Entity tag for a view: `"{stock}-{STATUS}-{start_ms}"`
    #[must_use]
    pub fn etag_for(view: &SaleView) -> String {
        format!(
            "\"{}-{}-{}\"",
            view.current_stock,
            view.status,
            view.start_time.timestamp_millis()
        )
    }

    /// Fresh cached entry, if any
    #[must_use]
    pub fn get(&self) -> Option<CachedStatus> {
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|cached| cached.cached_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Current invalidation generation; read it before building a view to `put`
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wrap `view` as an entry, storing it only if the cache was not
    /// invalidated since `seen_generation`
    pub fn put(&self, view: SaleView, seen_generation: u64) -> CachedStatus {
        let cached = CachedStatus {
            etag: Self::etag_for(&view),
            view,
            cached_at: Instant::now(),
        };
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::Acquire) == seen_generation {
            *entry = Some(cached.clone());
        } else {
            tracing::trace!("Skipping stale status cache refill");
        }
        cached
    }

    /// Drop the cached entry and start a new generation
    pub fn invalidate(&self) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *entry = None;
    }

    /// Clear the cache on every sale event until the channel closes
    pub fn spawn_invalidator(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<SaleEvent>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::trace!(event_type = event.event_type(), "Invalidating status cache");
                        cache.invalidate();
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Status cache invalidator lagged");
                        cache.invalidate();
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
