//! Runtime core: dispatch pipeline and lifecycle.
//!
//! The public API from this module is [`Engine`] (and its [`EngineBuilder`]) plus the
//! per-dispatch handle [`EventContext`] and its [`ContextState`].
//!
//! Internal modules:
//! - [`context`]: atomic claim/cancel state machine of one dispatch set;
//! - [`dispatch`]: type-erased (listener, entity, context) unit of work and its run policy;
//! - [`queue`]: bounded stage queues shared by a worker pool;
//! - [`dispense`]: claims queued sets or drops canceled ones;
//! - [`execution`]: runs listeners and their `then`/`catch` callbacks;
//! - [`engine`]: registration, dispatch entry points, start/stop;
//! - [`builder`]: pre-registered listeners and an outer shutdown token.

mod builder;
mod context;
mod dispatch;
mod dispense;
mod engine;
mod execution;
mod queue;

pub use context::{ContextState, EventContext};
pub use builder::EngineBuilder;
pub use engine::Engine;
