//! # Example: basic_dispatch
//!
//! Minimal example: one entity type, two closure listeners, a few dispatches.
//!
//! Demonstrates how to:
//! - Register closures with [`Engine::register_fn`].
//! - Start the worker pools and dispatch entities.
//! - Cancel a dispatch before a worker claims it.
//!
//! ## Flow
//! ```text
//! Engine::new(cfg) ──► register_fn × 2 ──► dispatch (queued, not started)
//!     ├─► ctx.cancel()                       (listener will never run)
//!     ├─► start()
//!     │     ├─► dispense: canceled set dropped
//!     │     └─► dispense: later sets claimed ──► execution: trigger()
//!     └─► stop()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=typedispatch=debug cargo run --example basic_dispatch
//! ```

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use typedispatch::{Engine, EngineConfig};

#[derive(Debug)]
struct Greeting {
    to: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Engine with default settings (multi-listener mode on)
    let engine = Engine::new(EngineConfig::default());

    // 2. Two listeners for the same entity type
    engine
        .register_fn(|g: &Greeting| {
            println!("[hello] hello, {}", g.to);
            Ok(())
        })
        .await?;
    engine
        .register_fn(|g: &Greeting| {
            println!("[shout] HELLO, {}!", g.to.to_uppercase());
            Ok(())
        })
        .await?;

    // 3. Queued before start: nothing claims it yet, so it can still be canceled
    let early = engine
        .dispatch(Greeting {
            to: "nobody".into(),
        })
        .await?;
    for ctx in &early {
        let too_late = ctx.cancel();
        println!("[main] canceled dispatch #{} (too late: {too_late})", ctx.id());
    }

    // 4. Spawn the worker pools
    engine.start();

    for to in ["alice", "bob"] {
        let contexts = engine.dispatch(Greeting { to: to.into() }).await?;
        println!("[main] {to}: {} dispatch sets queued", contexts.len());
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    // 5. Stop: workers exit, further dispatches are rejected
    engine.stop();
    engine.join().await;
    let late = engine.dispatch(Greeting { to: "late".into() }).await;
    println!("[main] after stop: {:?}", late.err());
    Ok(())
}
