//! # Example: callbacks
//!
//! A struct listener with `then`/`catch` callbacks, observed through the engine event bus.
//!
//! Demonstrates how to:
//! - Implement [`Listener`] for a struct and declare its [`Capability`].
//! - Route failures (and panics) to `catch`, successes to `then`.
//! - Watch pipeline steps with [`Engine::subscribe`].
//! - Use the process-wide engine slot from [`typedispatch::global`].
//!
//! ## Flow
//! ```text
//! global::run(cfg) ──► register(Payments)
//!     ├─► dispatch(Charge{ok})      ──► trigger Ok  ──► then()
//!     ├─► dispatch(Charge{declined})──► trigger Err ──► catch(Fail)
//!     └─► dispatch(Charge{0})       ──► trigger panics ──► catch(Panicked)
//! subscriber task prints every EngineEvent
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example callbacks
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;
use typedispatch::{global, Capability, EngineConfig, EngineEventKind, Listener, ListenerError};

#[derive(Debug)]
struct Charge {
    cents: u64,
    card: &'static str,
}

struct Payments;

#[async_trait]
impl Listener<Charge> for Payments {
    async fn trigger(&self, charge: &Charge) -> Result<(), ListenerError> {
        if charge.cents == 0 {
            panic!("zero-amount charge reached the gateway");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        if charge.card == "declined" {
            return Err(ListenerError::fail(format!("card declined for {} cents", charge.cents)));
        }
        Ok(())
    }

    async fn then(&self, charge: &Charge) {
        println!("[payments] charged {} cents on {}", charge.cents, charge.card);
    }

    async fn catch(&self, err: ListenerError) {
        println!("[payments] {} ({})", err, err.as_label());
    }

    fn capability(&self) -> Capability {
        Capability::WithCallback
    }

    fn name(&self) -> &str {
        "payments"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    // 1. Build, start and install the process-wide engine
    let engine = global::run(EngineConfig::new(4, 2, 4, 2, true));

    // 2. Print what the pipeline does
    let mut events = engine.subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            println!(
                "[event] #{:<3} {:?} dispatch={:?} reason={:?}",
                ev.seq, ev.kind, ev.dispatch_id, ev.reason
            );
            if ev.kind == EngineEventKind::EngineStopped {
                break;
            }
        }
    });

    // 3. Register through the slot, as library code would
    global::current()?.register::<Charge>(Arc::new(Payments)).await?;

    for charge in [
        Charge { cents: 1250, card: "visa" },
        Charge { cents: 990, card: "declined" },
        Charge { cents: 0, card: "visa" },
    ] {
        global::current()?.dispatch(charge).await?;
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    // 4. Stop and clear the slot
    global::close();
    watcher.await?;
    Ok(())
}
