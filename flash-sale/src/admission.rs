//! Purchase admission.
//!
//! The ordered check sequence applied to one purchase attempt: window
//! membership first, then the duplicate and stock checks inside
//! [`SaleState::try_claim`]. Callers must hold exclusive access to the state
//! for the whole call, which the sale reducer gets from the store.

use crate::state::SaleState;
use crate::types::{Identity, PurchaseOutcome, Rejection};
use chrono::{DateTime, Utc};

/// Decide one purchase attempt at `now`
///
/// Never retries. A rejection leaves the state untouched.
pub fn attempt_purchase(
    sale: &mut SaleState,
    identity: &Identity,
    now: DateTime<Utc>,
) -> PurchaseOutcome {
    if !sale.window().contains(now) {
        return PurchaseOutcome::rejected(Rejection::NotActive);
    }

    sale.try_claim(identity)
}
