//! Error types used by the dispatch engine and by listeners.
//!
//! This module defines two main error enums:
//!
//! - [`EngineError`] - errors returned synchronously by the engine
//!   (registration, dispatch, lifecycle).
//! - [`ListenerError`] - errors raised by a listener's `trigger`.
//!
//! Listener errors are never returned to the dispatch caller. They reach a listener's
//! [`catch`](crate::Listener::catch) callback when it declares one and are discarded otherwise.
//!
//! Both types provide `as_label` for logging.

use thiserror::Error;

/// # Errors produced by the engine.
///
/// All of them are detected on the caller's side of a call
/// (`register`, `dispatch`, global slot access) and returned there.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A listener is already registered for this entity type and multi-listener mode is off.
    #[error("listener already registered for `{entity}`")]
    AlreadyRegistered {
        /// Type name of the entity.
        entity: &'static str,
    },

    /// Dispatch of an entity type that has no registered listener.
    #[error("no event listener registered for `{entity}`")]
    NotFoundEventListener {
        /// Type name of the entity.
        entity: &'static str,
    },

    /// A function-backed listener was built without a trigger function.
    #[error("listener has no trigger function")]
    NoTriggerFunc,

    /// The intake queue had no room for every matched listener (`try_dispatch` only).
    #[error("intake queue full while dispatching `{entity}`")]
    QueueFull {
        /// Type name of the entity.
        entity: &'static str,
    },

    /// The engine was stopped; no further work is accepted.
    #[error("engine stopped")]
    Stopped,

    /// No engine is installed in the global slot.
    #[error("no engine installed")]
    NotInstalled,
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use typedispatch::EngineError;
    ///
    /// let err = EngineError::AlreadyRegistered { entity: "u32" };
    /// assert_eq!(err.as_label(), "already_registered");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::AlreadyRegistered { .. } => "already_registered",
            EngineError::NotFoundEventListener { .. } => "not_found_event_listener",
            EngineError::NoTriggerFunc => "no_trigger_func",
            EngineError::QueueFull { .. } => "queue_full",
            EngineError::Stopped => "engine_stopped",
            EngineError::NotInstalled => "engine_not_installed",
        }
    }
}

/// # Errors produced by a listener.
///
/// Returned from [`Listener::trigger`](crate::Listener::trigger), or synthesized by the
/// execution stage when `trigger` panics.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The listener reported a failure.
    #[error("listener failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The listener panicked while handling the entity.
    #[error("listener panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Fail`].
    ///
    /// # Example
    /// ```
    /// use typedispatch::ListenerError;
    ///
    /// let err = ListenerError::fail("boom");
    /// assert_eq!(err.to_string(), "listener failed: boom");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        ListenerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Fail { .. } => "listener_failed",
            ListenerError::Panicked { .. } => "listener_panicked",
        }
    }

    /// True if the error was synthesized from a panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, ListenerError::Panicked { .. })
    }
}

/// Renders a panic payload the way `std` prints it (`&str` or `String`, otherwise a placeholder).
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
