//! # Process-wide engine slot.
//!
//! Convenience for applications that want one engine reachable from anywhere
//! without threading an `Arc<Engine>` through their code.
//!
//! ```text
//! run(cfg) ──► Engine::new(cfg) ──► start() ──► install() ──► previous.stop()
//! current() ──► Ok(engine) | Err(NotInstalled)
//! close()   ──► take() ──► stop()
//! ```
//!
//! The slot is optional: every operation is also available on an explicitly owned
//! [`Engine`].

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::config::EngineConfig;
use crate::core::Engine;
use crate::error::EngineError;

static SLOT: RwLock<Option<Arc<Engine>>> = RwLock::new(None);

/// Puts `engine` into the slot. The engine previously installed, if any, is stopped
/// and returned.
pub fn install(engine: Arc<Engine>) -> Option<Arc<Engine>> {
    let previous = SLOT
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(engine);

    if let Some(previous) = &previous {
        info!("replacing installed engine");
        previous.stop();
    }
    previous
}

/// Builds, starts and installs an engine with the default configuration.
///
/// Must be called from within a Tokio runtime.
pub fn run_default() -> Arc<Engine> {
    run(EngineConfig::default())
}

/// Builds, starts and installs an engine with `cfg`, stopping the previous one.
///
/// Must be called from within a Tokio runtime.
pub fn run(cfg: EngineConfig) -> Arc<Engine> {
    let engine = Engine::new(cfg);
    engine.start();
    install(Arc::clone(&engine));
    engine
}

/// The installed engine.
///
/// ### Errors
/// [`EngineError::NotInstalled`] when the slot is empty.
pub fn current() -> Result<Arc<Engine>, EngineError> {
    SLOT.read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(EngineError::NotInstalled)
}

/// Stops the installed engine and clears the slot. No-op when empty.
pub fn close() {
    let engine = SLOT.write().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(engine) = engine {
        engine.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test: the slot is process-wide and unit tests run in parallel.
    #[tokio::test]
    async fn test_slot_lifecycle() {
        close();
        assert_eq!(current().unwrap_err(), EngineError::NotInstalled);

        let first = run_default();
        assert!(first.is_running());
        assert!(Arc::ptr_eq(&current().unwrap(), &first));

        let second = run(EngineConfig::new(2, 1, 2, 1, false));
        assert!(first.is_stopped());
        assert!(second.is_running());
        assert!(!current().unwrap().config().multi_listener);

        close();
        assert!(second.is_stopped());
        assert_eq!(current().unwrap_err(), EngineError::NotInstalled);
    }
}
