//! # typedispatch
//!
//! **typedispatch** is an in-process, type-keyed event dispatch engine for Tokio.
//!
//! Applications register listeners per entity type and dispatch values of that type.
//! Every dispatch fans out into one unit of work per matching listener, which flows
//! through bounded stage queues served by fixed worker pools. Each unit hands the
//! caller an [`EventContext`] that can cancel it until a worker claims it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!      register::<Order>(listener)           dispatch(Order { .. })
//!                 │                                   │
//!                 ▼                                   ▼
//! ┌────────────────────────────────┐    ┌──────────────────────────────────┐
//! │ ListenerRegistry               │◄───│ Engine                           │
//! │ TypeId ──► [listener; n]       │    │ - one DispatchSet per listener   │
//! └────────────────────────────────┘    │ - returns [EventContext; n]      │
//!                                       └────────────────┬─────────────────┘
//!                                                        ▼
//!                                                 [intake queue]
//!                                                        │
//!                                      dispense workers: try_claim()
//!                                        ├─ claimed  ──► [execution queue]
//!                                        └─ canceled ──► dropped
//!                                                        │
//!                                      execution workers: trigger(&entity)
//!                                        ├─ Ok  + then  ──► [after queue]
//!                                        ├─ Err + catch ──► [after queue]
//!                                        └─ otherwise   ──► done
//!                                                        │
//!                                      after workers: then(&entity) / catch(err)
//!
//!  every stage ──► Bus (broadcast EngineEvent) ──► Engine::subscribe()
//!  Engine::stop() ──► CancellationToken ──► all workers exit
//! ```
//!
//! ### Context lifecycle
//! ```text
//! Pending ──try_claim()──► Completed   (listener runs exactly once)
//!    └──────cancel()─────► Canceled    (listener never runs)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Listeners**     | Async handlers per entity type, optional `then`/`catch`.     | [`Listener`], [`Capability`]               |
//! | **Closures**      | Build listeners from plain functions.                        | [`ListenerFn`], [`ListenerFnBuilder`]      |
//! | **Engine**        | Registration, dispatch, worker pools, start/stop.            | [`Engine`], [`EngineBuilder`], [`EngineConfig`] |
//! | **Cancellation**  | Per-dispatch cancel before claim.                            | [`EventContext`], [`ContextState`]         |
//! | **Telemetry**     | Observe every pipeline step.                                 | [`Bus`], [`EngineEvent`], [`EngineEventKind`] |
//! | **Errors**        | Typed engine and listener errors.                            | [`EngineError`], [`ListenerError`]         |
//! | **Global slot**   | Optional process-wide engine.                                | [`global`]                                 |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use typedispatch::{Engine, EngineConfig, ListenerError, ListenerFn, ListenerRef};
//!
//! #[derive(Debug)]
//! struct Order {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default());
//!
//!     let mailer: ListenerRef<Order> = Arc::new(
//!         ListenerFn::new(|order: &Order| {
//!             if order.id == 0 {
//!                 return Err(ListenerError::fail("missing id"));
//!             }
//!             Ok(())
//!         })
//!         .with_name("mailer")
//!         .with_then(|order| println!("mailed order {}", order.id)),
//!     );
//!     engine.register(mailer).await?;
//!     engine.start();
//!
//!     let contexts = engine.dispatch(Order { id: 7 }).await?;
//!     assert_eq!(contexts.len(), 1);
//!
//!     engine.stop();
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod listeners;

pub mod global;

// ---- Public re-exports ----

pub use config::EngineConfig;
pub use crate::core::{ContextState, Engine, EngineBuilder, EventContext};
pub use error::{EngineError, ListenerError};
pub use events::{Bus, EngineEvent, EngineEventKind};
pub use listeners::{
    Capability, Listener, ListenerFn, ListenerFnBuilder, ListenerRef, ListenerRegistry,
};
