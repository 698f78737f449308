//! Sale state and the ledger the store owns.
//!
//! [`SaleState`] is the authoritative record of one sale window. It is only
//! ever mutated from inside the sale reducer, which the runtime store runs
//! under its exclusive write lock; that is what makes [`SaleState::try_claim`]
//! indivisible with respect to every other claim, reset, and reader.

use crate::error::InvariantViolation;
use crate::types::{Identity, PurchaseOutcome, Rejection, SaleStats, SaleWindow};
use std::collections::HashSet;

/// State of the current sale window
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaleState {
    window: SaleWindow,
    total_stock: u32,
    remaining_stock: u32,
    purchasers: HashSet<Identity>,
}

impl SaleState {
    /// Fresh window with full stock and no purchasers
    #[must_use]
    pub fn new(window: SaleWindow, total_stock: u32) -> Self {
        Self {
            window,
            total_stock,
            remaining_stock: total_stock,
            purchasers: HashSet::new(),
        }
    }

    /// The window this state belongs to
    #[must_use]
    pub const fn window(&self) -> SaleWindow {
        self.window
    }

    /// Units this window started with
    #[must_use]
    pub const fn total_stock(&self) -> u32 {
        self.total_stock
    }

    /// Units left
    #[must_use]
    pub const fn remaining_stock(&self) -> u32 {
        self.remaining_stock
    }

    /// `remaining_stock == 0`
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.remaining_stock == 0
    }

    /// Whether `identity` holds a unit in this window
    #[must_use]
    pub fn has_purchased(&self, identity: &Identity) -> bool {
        self.purchasers.contains(identity)
    }

    /// Identities holding a unit
    #[must_use]
    pub const fn purchasers(&self) -> &HashSet<Identity> {
        &self.purchasers
    }

    /// Claim one unit for `identity`
    ///
    /// The duplicate check runs before the stock check, so an identity that
    /// already holds a unit is told so even after the sale sells out. On
    /// success the stock decrement and the purchaser insert happen together.
    /// Window membership is not checked here.
    pub fn try_claim(&mut self, identity: &Identity) -> PurchaseOutcome {
        if self.purchasers.contains(identity) {
            return PurchaseOutcome::rejected(Rejection::AlreadyPurchased);
        }

        if self.remaining_stock == 0 {
            return PurchaseOutcome::rejected(Rejection::SoldOut);
        }

        self.remaining_stock -= 1;
        self.purchasers.insert(identity.clone());
        PurchaseOutcome::accepted()
    }

    /// Statistics for this window
    #[must_use]
    pub fn stats(&self) -> SaleStats {
        SaleStats {
            total_purchases: self.purchasers.len(),
            remaining_stock: self.remaining_stock,
            unique_identity_count: self.purchasers.len(),
        }
    }

    /// Check stock conservation
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if self.remaining_stock > self.total_stock {
            return Err(InvariantViolation::StockOverflow {
                remaining: self.remaining_stock,
                total: self.total_stock,
            });
        }

        let claimed = u64::from(self.total_stock - self.remaining_stock);
        if claimed != self.purchasers.len() as u64 {
            return Err(InvariantViolation::Conservation {
                remaining: self.remaining_stock,
                purchasers: self.purchasers.len(),
                total: self.total_stock,
            });
        }

        Ok(())
    }
}

/// Everything the sale store owns
///
/// `sale` is `None` until the first request initializes a window.
/// `last_decision` holds the outcome of the most recent purchase attempt so
/// the caller that dispatched it can read it back under the same lock hold.
#[derive(Clone, Debug, Default)]
pub struct SaleLedger {
    sale: Option<SaleState>,
    last_decision: Option<PurchaseOutcome>,
    windows_opened: u64,
}

impl SaleLedger {
    /// Ledger with no sale yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger already holding `sale`
    #[must_use]
    pub const fn with_sale(sale: SaleState) -> Self {
        Self {
            sale: Some(sale),
            last_decision: None,
            windows_opened: 1,
        }
    }

    /// Current sale, if initialized
    #[must_use]
    pub const fn sale(&self) -> Option<&SaleState> {
        self.sale.as_ref()
    }

    /// Mutable access to the current sale
    pub const fn sale_mut(&mut self) -> Option<&mut SaleState> {
        self.sale.as_mut()
    }

    /// Replace the current sale wholesale
    pub fn reinitialize(&mut self, sale: SaleState) {
        self.sale = Some(sale);
        self.windows_opened += 1;
    }

    /// Outcome of the most recent purchase attempt
    #[must_use]
    pub const fn last_decision(&self) -> Option<PurchaseOutcome> {
        self.last_decision
    }

    /// Record the outcome of a purchase attempt
    pub const fn record_decision(&mut self, decision: Option<PurchaseOutcome>) {
        self.last_decision = decision;
    }

    /// Number of windows opened since the process started
    #[must_use]
    pub const fn windows_opened(&self) -> u64 {
        self.windows_opened
    }

    /// Remaining stock of the current sale
    #[must_use]
    pub fn remaining_stock(&self) -> Option<u32> {
        self.sale.as_ref().map(SaleState::remaining_stock)
    }

    /// Statistics, falling back to full stock before initialization
    #[must_use]
    pub fn stats(&self, total_stock: u32) -> SaleStats {
        self.sale.as_ref().map_or(
            SaleStats {
                total_purchases: 0,
                remaining_stock: total_stock,
                unique_identity_count: 0,
            },
            SaleState::stats,
        )
    }

    /// Check the invariants of the current sale
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.sale.as_ref().map_or(Ok(()), SaleState::verify)
    }
}
