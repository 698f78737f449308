//! Error types for the flash sale service.
//!
//! Business rejections (not active, duplicate, sold out) are not errors; they
//! come back as [`PurchaseOutcome`](crate::types::PurchaseOutcome) values.
//! The types here cover faults.

use flash_sale_runtime::StoreError;
use thiserror::Error;

/// Broken sale invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Claimed units and purchasers disagree
    #[error("remaining stock {remaining} with {purchasers} purchasers does not add up to total stock {total}")]
    Conservation {
        /// Units left
        remaining: u32,
        /// Identities holding a unit
        purchasers: usize,
        /// Units the window started with
        total: u32,
    },

    /// More stock left than the window started with
    #[error("remaining stock {remaining} exceeds total stock {total}")]
    StockOverflow {
        /// Units left
        remaining: u32,
        /// Units the window started with
        total: u32,
    },
}

/// Errors returned by [`FlashSale`](crate::service::FlashSale) operations
#[derive(Error, Debug)]
pub enum SaleError {
    /// The store rejected the action
    #[error("sale store unavailable: {0}")]
    Store(#[from] StoreError),

    /// No sale window exists after a refresh
    #[error("sale state is not initialized")]
    Uninitialized,

    /// A purchase was reduced but no decision was recorded
    #[error("no admission decision recorded for purchase attempt")]
    MissingDecision,

    /// The sale state failed verification
    #[error("sale invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SaleError::from(InvariantViolation::StockOverflow {
            remaining: 11,
            total: 10,
        });
        assert_eq!(
            err.to_string(),
            "sale invariant violated: remaining stock 11 exceeds total stock 10"
        );

        let err = SaleError::from(StoreError::ShutdownInProgress);
        assert_eq!(err.to_string(), "sale store unavailable: Store is shutting down");
    }
}
