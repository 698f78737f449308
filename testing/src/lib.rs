//! # Flash Sale Testing
//!
//! Testing utilities and helpers for the flash sale admission controller.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - A contention helper that releases many tasks at once (`helpers::race`)
//! - A Given-When-Then harness for reducers (`ReducerTest`)
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_testing::{helpers::race, ManualClock};
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn last_unit_has_one_winner() {
//!     let clock = ManualClock::starting_at(opening_time());
//!     let sale = FlashSale::new(config, Arc::new(clock.clone()), sink);
//!
//!     let outcomes = race(100, |i| {
//!         let sale = sale.clone();
//!         async move { sale.attempt_purchase(&Identity::new(format!("buyer-{i}"))).await }
//!     })
//!     .await;
//! }
//! ```

use chrono::{DateTime, Utc};
use flash_sale_core::environment::Clock;


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use flash_sale_testing::mocks::FixedClock;
    /// use flash_sale_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same underlying time, so a test can keep one handle and
    /// give another to the code under test.
    ///
    /// ```
    /// use flash_sale_testing::mocks::{ManualClock, test_clock};
    /// use flash_sale_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::starting_at(test_clock().now());
    /// let handle = clock.clone();
    /// handle.advance(Duration::milliseconds(250));
    /// assert_eq!(clock.now() - test_clock().now(), Duration::milliseconds(250));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Jump to an absolute time
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }

        /// Move the clock forward (or backward, for a negative duration)
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
    }
}

/// Test helpers and utilities
pub mod helpers {
    use std::future::Future;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    /// Run `count` tasks that all start at the same instant and collect their results
    ///
    /// Each task is spawned onto the runtime and parked on a shared barrier until all
    /// of them are ready, which maximizes contention on whatever they touch. Results
    /// are returned in task-index order.
    ///
    /// # Panics
    ///
    /// Panics if any task panics.
    #[allow(clippy::panic)] // Test helper
    pub async fn race<F, Fut, T>(count: usize, make: F) -> Vec<T>
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let barrier = Arc::new(Barrier::new(count));
        let handles: Vec<_> = (0..count)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                let task = make(i);
                tokio::spawn(async move {
                    barrier.wait().await;
                    task.await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(count);
        for handle in futures::future::join_all(handles).await {
            match handle {
                Ok(result) => results.push(result),
                Err(e) => panic!("raced task panicked: {e}"),
            }
        }
        results
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use reducer_test::ReducerTest;
