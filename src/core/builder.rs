use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::engine::Engine;
use crate::{
    config::EngineConfig,
    error::EngineError,
    listeners::{ListenerRef, ListenerRegistry},
};

/// Builder for constructing an Engine with listeners and an outer shutdown signal.
pub struct EngineBuilder {
    cfg: EngineConfig,
    registry: ListenerRegistry,
    parent: Option<CancellationToken>,
}

impl EngineBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            registry: ListenerRegistry::new(cfg.multi_listener),
            cfg,
            parent: None,
        }
    }

    /// Registers `listener` for `E` before the engine exists.
    ///
    /// ### Errors
    /// [`EngineError::AlreadyRegistered`] in single-listener mode when `E` already has one.
    pub fn with_listener<E>(mut self, listener: ListenerRef<E>) -> Result<Self, EngineError>
    where
        E: Send + Sync + 'static,
    {
        self.registry.insert(listener)?;
        Ok(self)
    }

    /// Ties the engine to an application-wide shutdown token.
    ///
    /// Cancelling `parent` runs [`Engine::stop`]: workers exit, dispatches waiting on a
    /// full intake queue (async or blocking) resolve to [`EngineError::Stopped`], and
    /// `EngineStopped` is published.
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds a stopped engine.
    pub fn build(self) -> Arc<Engine> {
        Engine::from_parts(self.cfg, self.registry, self.parent)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::EngineEventKind;
    use crate::listeners::ListenerFn;

    #[tokio::test]
    async fn test_prebuilt_listeners_are_visible() {
        let engine = EngineBuilder::new(EngineConfig::default())
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())))
            .unwrap()
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())))
            .unwrap()
            .build();
        assert_eq!(engine.listener_count::<u8>().await, 2);
    }

    #[test]
    fn test_single_mode_applies_while_building() {
        let cfg = EngineConfig::default().with_multi_listener(false);
        let res = EngineBuilder::new(cfg)
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())))
            .unwrap()
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())));
        assert!(matches!(res, Err(EngineError::AlreadyRegistered { .. })));
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_engine() {
        let parent = CancellationToken::new();
        let engine = EngineBuilder::new(EngineConfig::default())
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())))
            .unwrap()
            .with_cancellation(parent.clone())
            .build();
        engine.start();

        parent.cancel();
        assert!(engine.is_stopped());
        assert_eq!(engine.dispatch(1u8).await.unwrap_err(), EngineError::Stopped);
        engine.join().await;
        assert_eq!(engine.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parent_cancellation_releases_blocking_dispatch() {
        let parent = CancellationToken::new();
        let engine = EngineBuilder::new(EngineConfig::new(1, 1, 1, 1, true))
            .with_listener::<u8>(ListenerFn::arc(|_: &u8| Ok(())))
            .unwrap()
            .with_cancellation(parent.clone())
            .build();
        let mut events = engine.subscribe();
        engine.dispatch(1u8).await.unwrap();

        // Never started: the intake queue stays full.
        let blocked = {
            let engine = engine.clone();
            std::thread::spawn(move || engine.dispatch_blocking(2u8))
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        parent.cancel();
        let res = tokio::time::timeout(
            Duration::from_secs(1),
            tokio::task::spawn_blocking(move || blocked.join()),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();
        assert_eq!(res.unwrap_err(), EngineError::Stopped);

        let stopped = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if events.recv().await.unwrap().kind == EngineEventKind::EngineStopped {
                    break;
                }
            }
        })
        .await;
        assert!(stopped.is_ok());
        assert!(engine.is_stopped());
    }

    #[tokio::test]
    async fn test_parent_cancelled_before_build_yields_stopped_engine() {
        let parent = CancellationToken::new();
        parent.cancel();
        let engine = EngineBuilder::new(EngineConfig::default())
            .with_cancellation(parent)
            .build();
        assert!(!engine.start());
        assert!(engine.is_stopped());
    }
}
