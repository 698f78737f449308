//! Sale window lifecycle.
//!
//! Decides when the current window is stale and installs a fresh one. The
//! check and the replacement are called from inside the sale reducer, so two
//! concurrent requests that both see an expired window still only open one new
//! window: the second one runs after the first has replaced it and finds a
//! current window.

use crate::state::{SaleLedger, SaleState};
use crate::types::SaleWindow;
use chrono::{DateTime, Duration, Utc};

/// Timing of sale windows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaleSchedule {
    pre_sale_delay: Duration,
    sale_duration: Duration,
}

impl SaleSchedule {
    /// Schedule with explicit durations
    #[must_use]
    pub const fn new(pre_sale_delay: Duration, sale_duration: Duration) -> Self {
        Self {
            pre_sale_delay,
            sale_duration,
        }
    }

    /// Schedule from millisecond settings
    #[must_use]
    pub fn from_millis(pre_sale_delay_ms: u64, sale_duration_ms: u64) -> Self {
        Self::new(millis(pre_sale_delay_ms), millis(sale_duration_ms))
    }

    /// Gap between a (re)initialization and the window opening
    #[must_use]
    pub const fn pre_sale_delay(&self) -> Duration {
        self.pre_sale_delay
    }

    /// Length of a window
    #[must_use]
    pub const fn sale_duration(&self) -> Duration {
        self.sale_duration
    }

    /// Whether a new window must be opened at `now`
    ///
    /// True when no sale exists yet or the existing window has ended.
    #[must_use]
    pub fn needs_new_window(sale: Option<&SaleState>, now: DateTime<Utc>) -> bool {
        sale.is_none_or(|sale| sale.window().has_ended(now))
    }

    /// Window for a sale initialized at `now`
    #[must_use]
    pub fn next_window(&self, now: DateTime<Utc>) -> SaleWindow {
        let start = now
            .checked_add_signed(self.pre_sale_delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        SaleWindow::new(start, self.sale_duration)
    }

    /// Open a new window if the current one is missing or over
    ///
    /// Returns the newly opened window, or `None` when the existing one is
    /// still current.
    pub fn ensure_current_window(
        &self,
        ledger: &mut SaleLedger,
        total_stock: u32,
        now: DateTime<Utc>,
    ) -> Option<SaleWindow> {
        if !Self::needs_new_window(ledger.sale(), now) {
            return None;
        }

        let window = self.next_window(now);
        ledger.reinitialize(SaleState::new(window, total_stock));
        tracing::info!(
            start = %window.start(),
            end = %window.end(),
            total_stock,
            "Opened sale window"
        );
        Some(window)
    }
}

impl Default for SaleSchedule {
    fn default() -> Self {
        Self::from_millis(30_000, 300_000)
    }
}

/// Longest configurable gap, roughly 292 years
const MAX_MILLIS: u64 = 9_223_372_036_854;

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms.min(MAX_MILLIS)).unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::types::Identity;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn first_request_opens_window_after_delay() {
        let schedule = SaleSchedule::from_millis(100, 1_000);
        let mut ledger = SaleLedger::new();

        let opened = schedule.ensure_current_window(&mut ledger, 5, at(0));

        let window = opened.expect("window should open");
        assert_eq!(window.start(), at(100));
        assert_eq!(window.end(), at(1_100));
        assert_eq!(ledger.remaining_stock(), Some(5));
    }

    #[test]
    fn current_window_is_kept() {
        let schedule = SaleSchedule::from_millis(100, 1_000);
        let mut ledger = SaleLedger::new();
        schedule.ensure_current_window(&mut ledger, 5, at(0));

        assert!(schedule.ensure_current_window(&mut ledger, 5, at(50)).is_none());
        assert!(schedule.ensure_current_window(&mut ledger, 5, at(1_100)).is_none());
        assert_eq!(ledger.windows_opened(), 1);
    }

    #[test]
    fn ended_window_is_replaced_with_full_stock() {
        let schedule = SaleSchedule::from_millis(100, 1_000);
        let mut ledger = SaleLedger::new();
        schedule.ensure_current_window(&mut ledger, 5, at(0));
        if let Some(sale) = ledger.sale_mut() {
            assert!(sale.try_claim(&Identity::new("alice")).accepted);
        }

        let opened = schedule.ensure_current_window(&mut ledger, 5, at(1_101));

        assert_eq!(opened.map(|w| w.start()), Some(at(1_201)));
        assert_eq!(ledger.remaining_stock(), Some(5));
        assert!(ledger.sale().is_some_and(|s| s.purchasers().is_empty()));
    }

    #[test]
    fn oversized_millis_do_not_overflow() {
        let schedule = SaleSchedule::from_millis(u64::MAX, 1);
        assert!(schedule.pre_sale_delay() > Duration::days(365));
    }
}
