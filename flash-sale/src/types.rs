//! Domain types for the flash sale.
//!
//! Value objects shared by the sale state, the admission protocol, and the
//! status projection. Everything here is plain data: no locks, no clocks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque buyer identity
///
/// Equality is exact string equality; no normalization is applied.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from any string-like value
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Product
// ============================================================================

/// The single item on sale
///
/// Immutable for the life of the process. `total_stock` seeds every new sale
/// window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Marketing copy
    pub description: String,
    /// Product image
    pub image_url: String,
    /// Units available at the start of every window
    pub total_stock: u32,
}

// ============================================================================
// Sale window
// ============================================================================

/// Closed time interval during which purchases may be admitted
///
/// A window is active for `start <= now <= end`; both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleWindow {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    end: DateTime<Utc>,
}

impl SaleWindow {
    /// Window opening at `start` and lasting `duration`
    ///
    /// A non-positive duration collapses to a single-instant window.
    #[must_use]
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        let end = start
            .checked_add_signed(duration.max(Duration::zero()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    /// First instant at which purchases are admitted
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Last instant at which purchases are admitted
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// `start <= now <= end`
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// `now < start`
    #[must_use]
    pub fn has_not_started(&self, now: DateTime<Utc>) -> bool {
        now < self.start
    }

    /// `now > end`
    #[must_use]
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }
}

// ============================================================================
// Status and admission results
// ============================================================================

/// Status label shown to clients
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    /// Window has not opened yet
    Upcoming,
    /// Window open and stock remains
    Active,
    /// No stock left
    SoldOut,
    /// The asking identity holds a unit
    PurchaseSuccess,
    /// Window closed
    Ended,
}

impl SaleStatus {
    /// Wire label of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Active => "ACTIVE",
            Self::SoldOut => "SOLD_OUT",
            Self::PurchaseSuccess => "PURCHASE_SUCCESS",
            Self::Ended => "ENDED",
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a purchase attempt was turned away
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    /// Outside the sale window
    NotActive,
    /// The identity already holds a unit
    AlreadyPurchased,
    /// No stock left
    SoldOut,
}

impl Rejection {
    /// User-facing message for the rejection
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotActive => "The sale is not active.",
            Self::AlreadyPurchased => "You have already purchased this item.",
            Self::SoldOut => "Sorry, the item is sold out.",
        }
    }

    /// Metric label for the rejection
    #[must_use]
    pub const fn as_label(self) -> &'static str {
        match self {
            Self::NotActive => "not_active",
            Self::AlreadyPurchased => "already_purchased",
            Self::SoldOut => "sold_out",
        }
    }
}

/// Message returned with an accepted purchase
pub const ACCEPTED_MESSAGE: &str = "Congratulations! You got one!";

/// Result of one purchase attempt
///
/// `identity_already_purchased` is true when the identity holds a unit after
/// the attempt, either because this attempt won one or an earlier one did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    /// Whether a unit was claimed by this attempt
    pub accepted: bool,
    /// User-facing message
    pub message: &'static str,
    /// Whether the identity holds a unit
    pub identity_already_purchased: bool,
    /// Reason for a rejection, `None` when accepted
    pub rejection: Option<Rejection>,
}

impl PurchaseOutcome {
    /// Outcome for a successful claim
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            accepted: true,
            message: ACCEPTED_MESSAGE,
            identity_already_purchased: true,
            rejection: None,
        }
    }

    /// Outcome for a rejected claim
    #[must_use]
    pub const fn rejected(reason: Rejection) -> Self {
        Self {
            accepted: false,
            message: reason.message(),
            identity_already_purchased: matches!(reason, Rejection::AlreadyPurchased),
            rejection: Some(reason),
        }
    }

    /// Metric label for the outcome
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self.rejection {
            None => "accepted",
            Some(reason) => reason.as_label(),
        }
    }
}

// ============================================================================
// Read models
// ============================================================================

/// Client view of the sale
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    /// The product on sale
    pub product: Product,
    /// Units left in the current window
    pub current_stock: u32,
    /// Projected status
    pub status: SaleStatus,
    /// Window start (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    /// Window end (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
}

/// Purchase statistics for the current window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleStats {
    /// Units claimed
    pub total_purchases: usize,
    /// Units left
    pub remaining_stock: u32,
    /// Distinct identities holding a unit
    pub unique_identity_count: usize,
}
