//! # Engine events emitted by the dispatch pipeline.
//!
//! The [`EngineEventKind`] enum classifies events across three categories:
//! - **Lifecycle events**: engine start/stop and listener registration
//! - **Dispatch events**: a dispatch set queued, claimed, or dropped before running
//! - **Outcome events**: what the listener (or its callback) did
//!
//! The [`EngineEvent`] struct carries the metadata: entity type name, listener name,
//! dispatch id and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events from different stages reach the bus in no particular order; sort by `seq`
//! to restore publication order.
//!
//! ## Example
//! ```rust
//! use typedispatch::{EngineEvent, EngineEventKind};
//!
//! let ev = EngineEvent::new(EngineEventKind::ListenerFailed)
//!     .with_entity("app::Order")
//!     .with_listener("audit")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EngineEventKind::ListenerFailed);
//! assert_eq!(ev.entity.as_deref(), Some("app::Order"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEventKind {
    // === Lifecycle ===
    /// Worker pools were spawned.
    EngineStarted,

    /// The shared cancellation signal fired.
    EngineStopped,

    /// A listener was added to the registry.
    ///
    /// Sets: `entity`, `listener`.
    ListenerRegistered,

    // === Dispatch ===
    /// A dispatch set entered the intake queue.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`.
    DispatchQueued,

    /// The dispense stage claimed a dispatch set; it will run exactly once.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`.
    DispatchClaimed,

    /// The dispense stage found the dispatch set canceled and dropped it.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`.
    DispatchDropped,

    // === Outcome ===
    /// `trigger` returned `Ok`.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`.
    ListenerSucceeded,

    /// `trigger` returned an error.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`, `reason`.
    ListenerFailed,

    /// `trigger` panicked.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`, `reason` (panic message).
    ListenerPanicked,

    /// `trigger` failed and the listener declares no `catch`; the error was dropped.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`, `reason`.
    ErrorDiscarded,

    /// A `then` or `catch` callback panicked.
    ///
    /// Sets: `entity`, `listener`, `dispatch_id`, `reason` (panic message).
    CallbackPanicked,
}

/// Engine event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EngineEventKind`]
#[derive(Clone, Debug)]
pub struct EngineEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EngineEventKind,
    /// Entity type name, if applicable.
    pub entity: Option<&'static str>,
    /// Listener name, if applicable.
    pub listener: Option<Arc<str>>,
    /// Dispatch id of the affected [`EventContext`](crate::EventContext), if applicable.
    pub dispatch_id: Option<u64>,
    /// Human-readable reason (errors, panic payloads).
    pub reason: Option<Arc<str>>,
}

impl EngineEvent {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EngineEventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            entity: None,
            listener: None,
            dispatch_id: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_entity(mut self, entity: &'static str) -> Self {
        self.entity = Some(entity);
        self
    }

    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    #[inline]
    pub fn with_dispatch_id(mut self, id: u64) -> Self {
        self.dispatch_id = Some(id);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for the kinds that end a dispatch set's life in the pipeline.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EngineEventKind::DispatchDropped
                | EngineEventKind::ListenerSucceeded
                | EngineEventKind::ListenerFailed
                | EngineEventKind::ListenerPanicked
        )
    }
}
