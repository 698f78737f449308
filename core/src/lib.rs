//! # Flash Sale Core
//!
//! Core traits and types for the flash sale admission controller.
//!
//! The sale is modelled as a single state machine driven by a reducer:
//!
//! - **State**: the one mutable sale record
//! - **Action**: every input to the reducer (window refresh, purchase attempt, reset)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of a side effect, executed by the runtime
//!   after the state lock has been released
//! - **Environment**: injected dependencies (clock, event sinks)
//!
//! The runtime crate owns the state behind a lock and runs `reduce` while holding
//! it exclusively, so every reduction is atomic with respect to readers and other
//! reductions.
//!
//! ## Example
//!
//! ```
//! use flash_sale_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct Tally {
//!     taken: u32,
//! }
//!
//! enum TallyAction {
//!     Take,
//! }
//!
//! struct TallyReducer;
//!
//! impl Reducer for TallyReducer {
//!     type State = Tally;
//!     type Action = TallyAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Tally,
//!         action: TallyAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<TallyAction>; 4]> {
//!         match action {
//!             TallyAction::Take => state.taken += 1,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = Tally::default();
//! let effects = TallyReducer.reduce(&mut state, TallyAction::Take, &());
//! assert_eq!(state.taken, 1);
//! assert_eq!(effects.len(), 1);
//! ```

// Re-export commonly used types
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action against the current state
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Most reductions produce zero or one effect, so the result is a
        /// `SmallVec` that stays on the stack in the common case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values, not execution: a reducer that returns an effect has not
/// performed any I/O.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are returned from reducers
    /// and executed by the Store runtime once the state lock is released.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap a future that produces no follow-up action
        #[must_use]
        pub fn fire_and_forget<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                future.await;
                None
            }))
        }

        /// Whether this effect does nothing when executed
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use flash_sale_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[test]
    fn none_is_a_noop() {
        let none: Effect<()> = Effect::None;
        assert!(none.is_none());
        assert_eq!(format!("{none:?}"), "Effect::None");
    }

    #[test]
    fn future_effect_is_not_a_noop() {
        let effect: Effect<()> = Effect::fire_and_forget(async {});
        assert!(!effect.is_none());
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[tokio::test]
    async fn fire_and_forget_yields_no_action() {
        let effect: Effect<u8> = Effect::fire_and_forget(async {});
        match effect {
            Effect::Future(fut) => assert_eq!(fut.await, None),
            other => unreachable!("expected a future effect, got {other:?}"),
        }
    }
}
