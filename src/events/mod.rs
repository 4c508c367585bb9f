//! Engine events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! observe what the dispatch pipeline does with each dispatch set.
//!
//! ## Contents
//! - [`EngineEventKind`], [`EngineEvent`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Engine` (lifecycle, registration, queueing), dispense workers
//!   (claim/drop), execution workers (outcome), after workers (callback panics).
//! - **Consumers**: anything holding a receiver from `Engine::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EngineEvent, EngineEventKind};
