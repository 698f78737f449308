//! Status projection.
//!
//! Pure functions deriving the client-facing status from a sale snapshot.

use crate::state::SaleState;
use crate::types::{Identity, Product, SaleStatus, SaleView};
use chrono::{DateTime, Utc};

/// Status of `sale` at `now`, as seen by `identity`
///
/// Time bounds are checked before stock, and the identity-specific success
/// check comes before the generic sold-out check.
#[must_use]
pub fn project(sale: &SaleState, now: DateTime<Utc>, identity: Option<&Identity>) -> SaleStatus {
    let window = sale.window();

    if window.has_not_started(now) {
        SaleStatus::Upcoming
    } else if window.has_ended(now) {
        SaleStatus::Ended
    } else if sale.is_sold_out() && identity.is_some_and(|id| sale.has_purchased(id)) {
        SaleStatus::PurchaseSuccess
    } else if sale.is_sold_out() {
        SaleStatus::SoldOut
    } else {
        SaleStatus::Active
    }
}

/// Full client view of `sale`
#[must_use]
pub fn view(
    product: &Product,
    sale: &SaleState,
    now: DateTime<Utc>,
    identity: Option<&Identity>,
) -> SaleView {
    let window = sale.window();
    SaleView {
        product: product.clone(),
        current_stock: sale.remaining_stock(),
        status: project(sale, now, identity),
        start_time: window.start(),
        end_time: window.end(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SaleWindow;
    use chrono::Duration;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn sold_out_to(buyer: &Identity) -> SaleState {
        let mut sale = SaleState::new(SaleWindow::new(at(100), Duration::milliseconds(100)), 1);
        assert!(sale.try_claim(buyer).accepted);
        sale
    }

    #[test]
    fn time_bounds_come_first() {
        let buyer = Identity::new("buyer");
        let sale = sold_out_to(&buyer);

        assert_eq!(project(&sale, at(99), Some(&buyer)), SaleStatus::Upcoming);
        assert_eq!(project(&sale, at(201), Some(&buyer)), SaleStatus::Ended);
    }

    #[test]
    fn sold_out_depends_on_identity() {
        let buyer = Identity::new("buyer");
        let sale = sold_out_to(&buyer);

        assert_eq!(project(&sale, at(150), Some(&buyer)), SaleStatus::PurchaseSuccess);
        assert_eq!(
            project(&sale, at(150), Some(&Identity::new("other"))),
            SaleStatus::SoldOut
        );
        assert_eq!(project(&sale, at(150), None), SaleStatus::SoldOut);
    }

    #[test]
    fn purchaser_sees_active_while_stock_remains() {
        let buyer = Identity::new("buyer");
        let mut sale = SaleState::new(SaleWindow::new(at(100), Duration::milliseconds(100)), 2);
        assert!(sale.try_claim(&buyer).accepted);

        assert_eq!(project(&sale, at(150), Some(&buyer)), SaleStatus::Active);
    }

    #[test]
    fn view_copies_window_and_stock() {
        let product = Product {
            id: "p".to_string(),
            name: "Watch".to_string(),
            description: String::new(),
            image_url: String::new(),
            total_stock: 2,
        };
        let sale = SaleState::new(SaleWindow::new(at(100), Duration::milliseconds(100)), 2);

        let view = view(&product, &sale, at(50), None);

        assert_eq!(view.status, SaleStatus::Upcoming);
        assert_eq!(view.current_stock, 2);
        assert_eq!(view.start_time, at(100));
        assert_eq!(view.end_time, at(200));
    }
}
