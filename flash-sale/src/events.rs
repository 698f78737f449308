//! Sale events and where they go.
//!
//! The sale reducer describes every state change as a [`SaleEvent`] and hands
//! it to a [`SaleEventSink`] from an effect, after the store lock has been
//! released. Publishing never feeds back into the sale state.

use crate::types::{Identity, SaleWindow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Something that happened to the sale
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SaleEvent {
    /// A fresh window was installed with full stock
    #[serde(rename_all = "camelCase")]
    WindowOpened {
        /// The new window
        window: SaleWindow,
        /// Stock the window starts with
        total_stock: u32,
    },
    /// A unit was claimed
    #[serde(rename_all = "camelCase")]
    PurchaseAccepted {
        /// Buyer
        identity: Identity,
        /// Units left after the claim
        remaining_stock: u32,
    },
    /// The last unit was claimed
    SoldOut {
        /// When the last unit went
        #[serde(with = "chrono::serde::ts_milliseconds")]
        at: DateTime<Utc>,
    },
}

impl SaleEvent {
    /// Event type name for logs
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::WindowOpened { .. } => "WindowOpened",
            Self::PurchaseAccepted { .. } => "PurchaseAccepted",
            Self::SoldOut { .. } => "SoldOut",
        }
    }
}

/// Destination for sale events
///
/// Implementations must not block; they run on the async runtime.
pub trait SaleEventSink: Send + Sync {
    /// Publish one event
    fn publish(&self, event: SaleEvent);
}

/// Fans events out to any number of subscribers
///
/// Events published while nobody is subscribed are dropped.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    sender: broadcast::Sender<SaleEvent>,
}

impl BroadcastSink {
    /// Sink buffering up to `capacity` events per lagging subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New subscription starting at the next published event
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl SaleEventSink for BroadcastSink {
    fn publish(&self, event: SaleEvent) {
        let event_type = event.event_type();
        if let Ok(receivers) = self.sender.send(event) {
            tracing::trace!(event_type, receivers, "Published sale event");
        }
    }
}

/// Keeps every event in memory
///
/// For tests and tooling that want to inspect what the sale did.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SaleEvent>>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events published so far
    #[must_use]
    pub fn events(&self) -> Vec<SaleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events published so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SaleEventSink for MemorySink {
    fn publish(&self, event: SaleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
