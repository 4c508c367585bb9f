//! # Engine event bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that lets every pipeline
//! stage report what happened to a dispatch without waiting on anyone.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                  Receivers (any number):
//!   Engine::dispatch ──┐
//!   dispense workers ──┼──────► Bus ───────► Engine::subscribe() receivers
//!   execution workers ─┤  (broadcast chan)
//!   after workers ─────┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks and never fails the caller.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::EngineEvent;

/// Broadcast channel for engine events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<EngineEvent>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: EngineEvent) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
