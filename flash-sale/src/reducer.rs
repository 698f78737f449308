//! Reducer for the sale ledger.
//!
//! Every request that touches the sale becomes one [`SaleAction`]. The store
//! reduces actions one at a time under its write lock, so the lifecycle check,
//! the possible reinitialization, and the claim of a single request form one
//! indivisible step.

use crate::admission;
use crate::events::{SaleEvent, SaleEventSink};
use crate::lifecycle::SaleSchedule;
use crate::metrics;
use crate::state::{SaleLedger, SaleState};
use crate::types::{Identity, Product};
use chrono::{DateTime, Utc};
use flash_sale_core::{effect::Effect, reducer::Reducer};
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// Actions the sale reducer understands
///
/// Each action carries the instant the request was received; the reducer never
/// reads a clock itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaleAction {
    /// Open a new window if the current one is missing or over
    RefreshWindow {
        /// Request time
        at: DateTime<Utc>,
    },
    /// Try to claim one unit
    AttemptPurchase {
        /// Buyer
        identity: Identity,
        /// Request time
        at: DateTime<Utc>,
    },
    /// Replace the sale with a fresh window regardless of the current one
    ResetSale {
        /// Request time
        at: DateTime<Utc>,
    },
}

/// Dependencies of the sale reducer
#[derive(Clone)]
pub struct SaleEnvironment {
    /// The product on sale
    pub product: Arc<Product>,
    /// Window timing
    pub schedule: SaleSchedule,
    /// Where sale events are published
    pub events: Arc<dyn SaleEventSink>,
}

impl SaleEnvironment {
    /// Create a new environment
    #[must_use]
    pub fn new(product: Arc<Product>, schedule: SaleSchedule, events: Arc<dyn SaleEventSink>) -> Self {
        Self {
            product,
            schedule,
            events,
        }
    }
}

/// Reducer owning every mutation of the sale ledger
#[derive(Clone, Copy, Debug, Default)]
pub struct SaleReducer;

impl SaleReducer {
    /// Create a new sale reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn ensure_window(
        ledger: &mut SaleLedger,
        env: &SaleEnvironment,
        at: DateTime<Utc>,
        events: &mut Vec<SaleEvent>,
    ) {
        let total_stock = env.product.total_stock;
        if let Some(window) = env.schedule.ensure_current_window(ledger, total_stock, at) {
            events.push(SaleEvent::WindowOpened {
                window,
                total_stock,
            });
        }
    }

    fn publish(events: Vec<SaleEvent>, env: &SaleEnvironment) -> Effect<SaleAction> {
        if events.is_empty() {
            return Effect::None;
        }

        let sink = Arc::clone(&env.events);
        Effect::fire_and_forget(async move {
            for event in events {
                metrics::record_sale_event(&event);
                sink.publish(event);
            }
        })
    }
}

impl Reducer for SaleReducer {
    type State = SaleLedger;
    type Action = SaleAction;
    type Environment = SaleEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut events = Vec::new();

        match action {
            SaleAction::RefreshWindow { at } => {
                Self::ensure_window(state, env, at, &mut events);
            },

            SaleAction::AttemptPurchase { identity, at } => {
                Self::ensure_window(state, env, at, &mut events);

                let Some(sale) = state.sale_mut() else {
                    state.record_decision(None);
                    return smallvec![Self::publish(events, env)];
                };

                let outcome = admission::attempt_purchase(sale, &identity, at);
                if outcome.accepted {
                    let remaining_stock = sale.remaining_stock();
                    events.push(SaleEvent::PurchaseAccepted {
                        identity: identity.clone(),
                        remaining_stock,
                    });
                    if remaining_stock == 0 {
                        events.push(SaleEvent::SoldOut { at });
                    }
                }

                if let Err(violation) = sale.verify() {
                    tracing::error!(%violation, %identity, "Sale invariant violated after purchase");
                }

                tracing::debug!(
                    %identity,
                    accepted = outcome.accepted,
                    outcome = outcome.as_label(),
                    remaining_stock = sale.remaining_stock(),
                    "Purchase decided"
                );
                state.record_decision(Some(outcome));
            },

            SaleAction::ResetSale { at } => {
                let window = env.schedule.next_window(at);
                let total_stock = env.product.total_stock;
                state.reinitialize(SaleState::new(window, total_stock));
                state.record_decision(None);
                tracing::info!(
                    start = %window.start(),
                    end = %window.end(),
                    total_stock,
                    "Sale reset"
                );
                events.push(SaleEvent::WindowOpened {
                    window,
                    total_stock,
                });
            },
        }

        smallvec![Self::publish(events, env)]
    }
}
