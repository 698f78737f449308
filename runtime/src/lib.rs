//! # Flash Sale Runtime
//!
//! Runtime implementation for the flash sale admission controller.
//!
//! This crate provides the [`Store`] that owns the single authoritative copy of a
//! reducer's state and coordinates reducer execution and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: Owns state behind one `RwLock`; every action is reduced while the
//!   write lock is held, so reductions are mutually exclusive with each other and
//!   with readers
//! - **Effect Executor**: Executes effect descriptions after the lock is released
//!   and feeds produced actions back into the store
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Reduce an action and inspect the resulting state under the same lock hold
//! let value = store.dispatch(Action::DoSomething, |s| s.some_field).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use flash_sale_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` or `dispatch()` is called after
        /// shutdown was initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;
pub use store::Store;

/// Health check status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is operational but experiencing issues
    Degraded,

    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Optional metadata (e.g., pending effect counts)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
///
/// Ensures the pending-effect counter is always decremented, even if the effect panics.
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, Duration, Effect, HealthCheck,
        Ordering, Reducer, RwLock, StoreError,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// # Concurrency Contract
    ///
    /// - `send`/`dispatch` hold the write lock for exactly one `reduce` call (plus
    ///   the optional inspection closure). No reader or other reduction can observe
    ///   the state while it is being mutated.
    /// - `state` holds the read lock for the duration of the closure; many readers
    ///   may proceed in parallel.
    /// - Effects run after the write lock is released and never hold it.
    ///
    /// Cloning a Store is cheap and yields another handle to the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation (business logic)
        /// - `environment`: Injected dependencies
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock on state
        /// 2. Calls the reducer with (state, action, environment)
        /// 3. Releases the lock
        /// 4. Starts executing the returned effects in spawned tasks
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send(&self, action: A) -> Result<(), StoreError> {
            self.dispatch(action, |_| ()).await
        }

        /// Reduce an action and inspect the resulting state atomically
        ///
        /// The `inspect` closure runs while the write lock taken for the reduction is
        /// still held, so it observes exactly the state the reducer produced. This is
        /// how callers obtain the result of a decision made inside `reduce` without
        /// any other action slipping in between.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip_all, name = "store_dispatch")]
        pub async fn dispatch<F, T>(&self, action: A, inspect: F) -> Result<T, StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejecting action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            let (effects, output) = {
                let mut state = self.state.write().await;
                let started = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                let output = inspect(&*state);
                metrics::histogram!("store_reduce_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                (effects, output)
            };
            metrics::counter!("store_actions_total").increment(1);

            for effect in effects {
                self.execute_effect(effect);
            }

            Ok(output)
        }

        /// Read current state via a closure
        ///
        /// Access state through a closure to ensure the lock is released promptly:
        ///
        /// ```ignore
        /// let remaining = store.state(|s| s.remaining()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Number of effects that have been started but not yet finished
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Whether shutdown has been initiated
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Health of the store
        ///
        /// Unhealthy once shutdown has begun; otherwise healthy, with the number of
        /// in-flight effects attached as metadata.
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let check = if self.is_shutting_down() {
                HealthCheck::unhealthy("store", "Store is shutting down")
            } else {
                HealthCheck::healthy("store")
            };
            check.with_metadata("pending_effects", self.pending_effects().to_string())
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Waits for pending effects to complete (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Execute an effect
        ///
        /// - `None`: No-op
        /// - `Future`: Spawned; a produced action is sent back into the store
        ///
        /// Effect failures never halt the store. A feedback action rejected because
        /// of shutdown is logged and dropped.
        fn execute_effect(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {
                    metrics::counter!("store_effects_executed_total", "type" => "none")
                        .increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store_effects_executed_total", "type" => "future")
                        .increment(1);

                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            if let Err(error) = store.send(action).await {
                                tracing::warn!(%error, "Dropping feedback action");
                            }
                        }
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_sale_core::{SmallVec, smallvec};

    #[derive(Debug, Default)]
    struct Slots {
        remaining: u32,
        taken: Vec<usize>,
        last_taken: Option<bool>,
    }

    #[derive(Debug)]
    enum SlotAction {
        Take(usize),
        Refill(u32),
    }

    struct SlotReducer;

    impl Reducer for SlotReducer {
        type State = Slots;
        type Action = SlotAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Slots,
            action: SlotAction,
            _env: &(),
        ) -> SmallVec<[Effect<SlotAction>; 4]> {
            match action {
                SlotAction::Take(who) => {
                    let taken = state.remaining > 0;
                    if taken {
                        state.remaining -= 1;
                        state.taken.push(who);
                    }
                    state.last_taken = Some(taken);
                    smallvec![Effect::None]
                },
                SlotAction::Refill(n) => {
                    state.remaining = n;
                    state.taken.clear();
                    SmallVec::new()
                },
            }
        }
    }

    #[tokio::test]
    async fn dispatch_observes_the_state_it_produced() {
        let store = Store::new(Slots { remaining: 1, ..Slots::default() }, SlotReducer, ());

        let first = store.dispatch(SlotAction::Take(1), |s| s.last_taken).await;
        let second = store.dispatch(SlotAction::Take(2), |s| s.last_taken).await;

        assert_eq!(first.ok().flatten(), Some(true));
        assert_eq!(second.ok().flatten(), Some(false));
        assert_eq!(store.state(|s| s.taken.clone()).await, vec![1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatches_are_serialized() {
        let store = Store::new(Slots { remaining: 3, ..Slots::default() }, SlotReducer, ());

        let wins = flash_sale_testing::helpers::race(50, |i| {
            let store = store.clone();
            async move {
                store
                    .dispatch(SlotAction::Take(i), |s| s.last_taken == Some(true))
                    .await
                    .unwrap_or(false)
            }
        })
        .await;

        assert_eq!(wins.iter().filter(|won| **won).count(), 3);
        assert_eq!(store.state(|s| (s.remaining, s.taken.len())).await, (0, 3));
    }

    #[tokio::test]
    async fn send_after_shutdown_is_rejected() {
        let store = Store::new(Slots::default(), SlotReducer, ());
        assert!(store.health().status.is_healthy());

        assert!(store.shutdown(Duration::from_millis(100)).await.is_ok());
        assert!(matches!(
            store.send(SlotAction::Refill(5)).await,
            Err(StoreError::ShutdownInProgress)
        ));
        assert_eq!(store.health().status, HealthStatus::Unhealthy);
        assert_eq!(store.state(|s| s.remaining).await, 0);
    }
}
