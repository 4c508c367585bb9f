//! # Listener abstraction.
//!
//! This module defines the [`Listener`] trait (async) and the [`Capability`] a listener
//! declares for its post-execution callbacks. The common handle type is [`ListenerRef`],
//! an `Arc<dyn Listener<E>>` suitable for sharing across the pipeline.
//!
//! A listener is registered against exactly one entity type `E`. The engine calls
//! [`trigger`](Listener::trigger) once per dispatch; depending on the declared capability
//! it then schedules [`then`](Listener::then) (on success) or [`catch`](Listener::catch)
//! (on failure) on the after stage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ListenerError;

/// Shared reference to a listener for entities of type `E`.
pub type ListenerRef<E> = Arc<dyn Listener<E>>;

/// Post-execution callbacks a listener takes part in.
///
/// | Capability     | `then` after success | `catch` after failure |
/// |----------------|----------------------|-----------------------|
/// | `Basic`        | no                   | no                    |
/// | `WithThen`     | yes                  | no                    |
/// | `WithCatch`    | no                   | yes                   |
/// | `WithCallback` | yes                  | yes                   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capability {
    #[default]
    Basic,
    WithThen,
    WithCatch,
    WithCallback,
}

impl Capability {
    /// Derives the capability from which callbacks are present.
    pub fn from_flags(then: bool, catch: bool) -> Self {
        match (then, catch) {
            (false, false) => Capability::Basic,
            (true, false) => Capability::WithThen,
            (false, true) => Capability::WithCatch,
            (true, true) => Capability::WithCallback,
        }
    }

    /// True if `then` runs after a successful trigger.
    #[inline]
    pub fn has_then(self) -> bool {
        matches!(self, Capability::WithThen | Capability::WithCallback)
    }

    /// True if `catch` runs after a failed trigger.
    #[inline]
    pub fn has_catch(self) -> bool {
        matches!(self, Capability::WithCatch | Capability::WithCallback)
    }
}

/// # Handler for entities of type `E`.
///
/// Only [`trigger`](Listener::trigger) is required. Override [`capability`](Listener::capability)
/// together with `then` and/or `catch` to receive post-execution callbacks; callbacks that
/// the capability does not declare are never invoked.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use typedispatch::{Capability, Listener, ListenerError};
///
/// struct OrderPlaced(u64);
///
/// struct Mailer;
///
/// #[async_trait]
/// impl Listener<OrderPlaced> for Mailer {
///     fn name(&self) -> &str { "mailer" }
///
///     fn capability(&self) -> Capability { Capability::WithCatch }
///
///     async fn trigger(&self, order: &OrderPlaced) -> Result<(), ListenerError> {
///         if order.0 == 0 {
///             return Err(ListenerError::fail("order without id"));
///         }
///         Ok(())
///     }
///
///     async fn catch(&self, err: ListenerError) {
///         eprintln!("mail not sent: {err}");
///     }
/// }
/// ```
#[async_trait]
pub trait Listener<E>: Send + Sync + 'static
where
    E: Send + Sync + 'static,
{
    /// Handles one entity.
    async fn trigger(&self, entity: &E) -> Result<(), ListenerError>;

    /// Runs on the after stage when `trigger` succeeded and the capability includes `then`.
    async fn then(&self, _entity: &E) {}

    /// Runs on the after stage when `trigger` failed and the capability includes `catch`.
    async fn catch(&self, _error: ListenerError) {}

    /// Declared post-execution callbacks.
    fn capability(&self) -> Capability {
        Capability::Basic
    }

    /// Human-readable name (for logs and engine events).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_flags() {
        assert_eq!(Capability::from_flags(false, false), Capability::Basic);
        assert_eq!(Capability::from_flags(true, false), Capability::WithThen);
        assert_eq!(Capability::from_flags(false, true), Capability::WithCatch);
        assert_eq!(Capability::from_flags(true, true), Capability::WithCallback);
    }

    #[test]
    fn test_capability_predicates() {
        assert!(!Capability::Basic.has_then());
        assert!(!Capability::Basic.has_catch());
        assert!(Capability::WithThen.has_then());
        assert!(!Capability::WithThen.has_catch());
        assert!(Capability::WithCatch.has_catch());
        assert!(!Capability::WithCatch.has_then());
        assert!(Capability::WithCallback.has_then());
        assert!(Capability::WithCallback.has_catch());
    }
}
