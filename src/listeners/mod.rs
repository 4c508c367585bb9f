//! # Listener abstractions and the type-keyed registry.
//!
//! This module provides the listener-related types:
//! - [`Listener`] - trait for async handlers of one entity type
//! - [`Capability`] - which post-execution callbacks a listener takes part in
//! - [`ListenerFn`] - closure-backed listener (and its builder)
//! - [`ListenerRef`] - shared reference to a listener (`Arc<dyn Listener<E>>`)
//! - [`ListenerRegistry`] - entity type → ordered listeners

mod listener;
mod listener_fn;
mod registry;

pub use listener::{Capability, Listener, ListenerRef};
pub use listener_fn::{ListenerFn, ListenerFnBuilder};
pub use registry::ListenerRegistry;
