//! The flash sale service handle.
//!
//! [`FlashSale`] is what the entry point constructs once and hands to request
//! handlers. It reads the clock once per request, turns the request into a
//! [`SaleAction`], and reads results back from the ledger.

use crate::config::Config;
use crate::error::SaleError;
use crate::events::SaleEventSink;
use crate::lifecycle::SaleSchedule;
use crate::metrics;
use crate::projection;
use crate::reducer::{SaleAction, SaleEnvironment, SaleReducer};
use crate::state::SaleLedger;
use crate::types::{Identity, Product, PurchaseOutcome, SaleStats, SaleView};
use flash_sale_core::environment::Clock;
use flash_sale_runtime::{HealthCheck, Store};
use std::sync::Arc;
use std::time::Duration;

/// Store type backing the sale
pub type SaleStore = Store<SaleLedger, SaleAction, SaleEnvironment, SaleReducer>;

/// Handle to the single sale
///
/// Cloning is cheap; all clones share one ledger.
#[derive(Clone)]
pub struct FlashSale {
    store: SaleStore,
    clock: Arc<dyn Clock>,
    product: Arc<Product>,
}

impl FlashSale {
    /// Sale for `product` with no window yet
    ///
    /// The first request opens the first window.
    #[must_use]
    pub fn new(
        product: Product,
        schedule: SaleSchedule,
        clock: Arc<dyn Clock>,
        events: Arc<dyn SaleEventSink>,
    ) -> Self {
        let product = Arc::new(product);
        let environment = SaleEnvironment::new(Arc::clone(&product), schedule, events);
        Self {
            store: Store::new(SaleLedger::new(), SaleReducer::new(), environment),
            clock,
            product,
        }
    }

    /// Sale configured from [`Config`]
    #[must_use]
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        events: Arc<dyn SaleEventSink>,
    ) -> Self {
        Self::new(config.product(), config.sale.schedule(), clock, events)
    }

    /// The product on sale
    #[must_use]
    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Current view of the sale, as seen by `identity`
    ///
    /// Opens a new window first if the current one is missing or over.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Store`] when the store is shutting down and a new
    /// window would be needed.
    #[tracing::instrument(skip_all, fields(identity = identity.map(Identity::as_str)))]
    pub async fn current_state(&self, identity: Option<&Identity>) -> Result<SaleView, SaleError> {
        let now = self.clock.now();
        let project = |ledger: &SaleLedger| {
            ledger
                .sale()
                .filter(|sale| !SaleSchedule::needs_new_window(Some(*sale), now))
                .map(|sale| projection::view(&self.product, sale, now, identity))
        };

        if let Some(view) = self.store.state(project).await {
            return Ok(view);
        }

        self.store
            .dispatch(SaleAction::RefreshWindow { at: now }, project)
            .await?
            .ok_or(SaleError::Uninitialized)
    }

    /// Try to claim one unit for `identity`
    ///
    /// Business rejections come back as `Ok` outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Store`] when the store is shutting down, or
    /// [`SaleError::MissingDecision`] if the reducer recorded no outcome.
    #[tracing::instrument(skip_all, fields(identity = %identity))]
    pub async fn attempt_purchase(&self, identity: &Identity) -> Result<PurchaseOutcome, SaleError> {
        let action = SaleAction::AttemptPurchase {
            identity: identity.clone(),
            at: self.clock.now(),
        };

        let outcome = self
            .store
            .dispatch(action, SaleLedger::last_decision)
            .await?
            .ok_or(SaleError::MissingDecision)?;

        metrics::record_purchase_attempt(&outcome);
        Ok(outcome)
    }

    /// Whether `identity` holds a unit in the current window
    ///
    /// Never opens a window; false before the first one.
    pub async fn has_purchased(&self, identity: &Identity) -> bool {
        self.store
            .state(|ledger| ledger.sale().is_some_and(|sale| sale.has_purchased(identity)))
            .await
    }

    /// Statistics for the current window
    ///
    /// Before the first window this reports full stock and no purchases.
    pub async fn stats(&self) -> SaleStats {
        let total_stock = self.product.total_stock;
        self.store.state(|ledger| ledger.stats(total_stock)).await
    }

    /// Identities holding a unit, in no particular order
    pub async fn purchasers(&self) -> Vec<Identity> {
        self.store
            .state(|ledger| {
                ledger
                    .sale()
                    .map(|sale| sale.purchasers().iter().cloned().collect())
                    .unwrap_or_default()
            })
            .await
    }

    /// Replace the sale with a fresh window starting after the pre-sale delay
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Store`] when the store is shutting down.
    #[tracing::instrument(skip_all)]
    pub async fn reset_sale(&self) -> Result<(), SaleError> {
        self.store
            .dispatch(SaleAction::ResetSale { at: self.clock.now() }, |_| ())
            .await?;
        Ok(())
    }

    /// Check the sale invariants against the current state
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::InvariantViolation`] describing the broken invariant.
    pub async fn verify_invariants(&self) -> Result<(), SaleError> {
        self.store.state(SaleLedger::verify).await?;
        Ok(())
    }

    /// Health of the underlying store
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        self.store.health()
    }

    /// Stop accepting actions and wait for published events to drain
    ///
    /// # Errors
    ///
    /// Returns [`SaleError::Store`] if effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), SaleError> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::types::{Rejection, SaleStatus};
    use chrono::Duration as TimeDelta;
    use flash_sale_testing::{test_clock, ManualClock};

    fn product(stock: u32) -> Product {
        Product {
            id: "prod_test".to_string(),
            name: "Test Watch".to_string(),
            description: "A watch".to_string(),
            image_url: String::new(),
            total_stock: stock,
        }
    }

    fn sale(stock: u32) -> (FlashSale, ManualClock) {
        let clock = ManualClock::starting_at(test_clock().now());
        let sale = FlashSale::new(
            product(stock),
            SaleSchedule::from_millis(1_000, 10_000),
            Arc::new(clock.clone()),
            Arc::new(MemorySink::new()),
        );
        (sale, clock)
    }

    #[tokio::test]
    async fn first_read_opens_upcoming_window() {
        let (sale, _clock) = sale(3);

        let view = sale
            .current_state(None)
            .await
            .expect("state failed");

        assert_eq!(view.status, SaleStatus::Upcoming);
        assert_eq!(view.current_stock, 3);
        assert_eq!(view.start_time, test_clock().now() + TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn stats_before_first_window_report_full_stock() {
        let (sale, _clock) = sale(7);

        let stats = sale.stats().await;

        assert_eq!(stats.remaining_stock, 7);
        assert_eq!(stats.total_purchases, 0);
        assert!(sale.purchasers().await.is_empty());
        assert!(!sale.has_purchased(&Identity::new("alice")).await);
    }

    #[tokio::test]
    async fn purchase_flow_through_window() {
        let (sale, clock) = sale(2);
        let alice = Identity::new("alice");

        let early = sale
            .attempt_purchase(&alice)
            .await
            .expect("purchase failed");
        assert_eq!(early.rejection, Some(Rejection::NotActive));

        clock.advance(TimeDelta::seconds(2));
        let bought = sale
            .attempt_purchase(&alice)
            .await
            .expect("purchase failed");
        assert!(bought.accepted);
        assert!(sale.has_purchased(&alice).await);
        assert_eq!(sale.purchasers().await, vec![alice.clone()]);

        let stats = sale.stats().await;
        assert_eq!(stats.total_purchases, 1);
        assert_eq!(stats.remaining_stock, 1);
        assert_eq!(stats.unique_identity_count, 1);
        assert!(sale.verify_invariants().await.is_ok());
    }

    #[tokio::test]
    async fn reset_clears_purchasers() {
        let (sale, clock) = sale(2);
        sale.current_state(None)
            .await
            .expect("state failed");
        clock.advance(TimeDelta::seconds(2));
        let _ = sale.attempt_purchase(&Identity::new("alice")).await;

        sale.reset_sale()
            .await
            .expect("reset failed");

        let view = sale
            .current_state(None)
            .await
            .expect("state failed");
        assert_eq!(view.status, SaleStatus::Upcoming);
        assert_eq!(view.current_stock, 2);
        assert!(sale.purchasers().await.is_empty());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_purchases() {
        let (sale, _clock) = sale(2);

        sale.shutdown(std::time::Duration::from_secs(1))
            .await
            .expect("shutdown failed");

        let result = sale.attempt_purchase(&Identity::new("late")).await;
        assert!(matches!(result, Err(SaleError::Store(_))));
        assert!(!sale.health().status.is_healthy());
    }
}
