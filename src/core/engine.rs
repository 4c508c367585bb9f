//! # Engine: registry, queues, worker pools and their lifecycle.
//!
//! The [`Engine`] owns the listener registry, the three bounded stage queues, the
//! cancellation token shared by every worker, and the engine event bus.
//!
//! ## Key responsibilities
//! - register listeners per entity type (single- or multi-listener mode)
//! - turn one `dispatch` into one dispatch set per matched listener and queue them
//! - spawn the worker pools exactly once ([`Engine::start`])
//! - fire the shared cancellation signal ([`Engine::stop`])
//!
//! ## High-level architecture
//! ```text
//! dispatch(entity) ──► registry.lookup::<E>() ──► [DispatchSet; N] ──► contexts to caller
//!                                                       │
//!                                                       ▼
//!                                               [intake queue]   (caller waits when full)
//!                                                       │
//!                                dispense worker × dispense_workers   (claim or drop)
//!                                                       ▼
//!                                              [execution queue]
//!                                                       │
//!                               execution worker × execution_workers  (trigger)
//!                                                       ▼
//!                                                [after queue]
//!                                                       │
//!                                   after worker × execution_workers  (then / catch)
//!
//! stop(): token.cancel() ──► every worker leaves its loop; queued work is abandoned
//! ```
//!
//! ## Rules
//! - `start` is idempotent; a stopped engine cannot be started again.
//! - `stop` does not wait for running listeners and does not drain queues;
//!   [`Engine::join`] waits for the workers separately.
//! - After `stop`, every dispatch entry point fails with [`EngineError::Stopped`];
//!   a dispatch waiting on a full intake queue resolves to `Stopped` as well.
//! - A parent shutdown token (see [`EngineBuilder::with_cancellation`]) firing runs the
//!   same path as `stop`.
//! - Before `start`, dispatches are queued until the intake queue is full, then wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::builder::EngineBuilder;
use super::context::EventContext;
use super::dispatch::{AfterAction, Dispatch, DispatchMeta, DispatchSet};
use super::queue::{self, SharedReceiver};
use super::{dispense, execution};
use crate::config::EngineConfig;
use crate::error::{EngineError, ListenerError};
use crate::events::{Bus, EngineEvent, EngineEventKind};
use crate::listeners::{ListenerFn, ListenerRef, ListenerRegistry};

/// Queue ends handed to the worker pools on `start`.
struct Pipeline {
    intake: SharedReceiver<Box<dyn Dispatch>>,
    execution_tx: mpsc::Sender<Box<dyn Dispatch>>,
    execution_rx: SharedReceiver<Box<dyn Dispatch>>,
    after_tx: mpsc::Sender<AfterAction>,
    after_rx: SharedReceiver<AfterAction>,
}

/// In-process, type-keyed dispatch engine.
pub struct Engine {
    cfg: EngineConfig,
    registry: ListenerRegistry,
    bus: Bus,
    token: CancellationToken,
    intake: mpsc::Sender<Box<dyn Dispatch>>,
    /// Present until `start` (or `stop`) takes it.
    pipeline: Mutex<Option<Pipeline>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    /// Set when a parent token exists; cancelled on drop to release the watcher.
    alive: Option<CancellationToken>,
    watching: AtomicBool,
}

impl Engine {
    /// Creates a stopped engine. Call [`start`](Self::start) to spawn the worker pools.
    pub fn new(cfg: EngineConfig) -> Arc<Self> {
        EngineBuilder::new(cfg).build()
    }

    /// Returns a builder for pre-registered listeners or an outer shutdown token.
    pub fn builder(cfg: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(cfg)
    }

    pub(super) fn from_parts(
        cfg: EngineConfig,
        registry: ListenerRegistry,
        parent: Option<CancellationToken>,
    ) -> Arc<Self> {
        let token = match &parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let (intake_tx, intake_rx) = queue::channel(cfg.intake_capacity_clamped());
        let (execution_tx, execution_rx) = queue::channel(cfg.execution_capacity_clamped());
        let (after_tx, after_rx) = queue::channel(cfg.after_capacity_clamped());

        let engine = Arc::new(Self {
            registry,
            bus: Bus::new(cfg.bus_capacity_clamped()),
            token,
            intake: intake_tx,
            pipeline: Mutex::new(Some(Pipeline {
                intake: intake_rx,
                execution_tx,
                execution_rx,
                after_tx,
                after_rx,
            })),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            alive: parent.map(|_| CancellationToken::new()),
            watching: AtomicBool::new(false),
            cfg,
        });
        if let Ok(runtime) = Handle::try_current() {
            engine.watch_parent(&runtime);
        }
        engine
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Receiver for engine events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire) && !self.is_stopped()
    }

    /// True once `stop` has been called or the parent shutdown token fired.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire) || self.token.is_cancelled()
    }

    // ---------------------------
    // Registration
    // ---------------------------

    /// Registers `listener` for entity type `E`.
    ///
    /// ### Errors
    /// [`EngineError::AlreadyRegistered`] in single-listener mode when `E` already has one.
    pub async fn register<E>(&self, listener: ListenerRef<E>) -> Result<(), EngineError>
    where
        E: Send + Sync + 'static,
    {
        let name: Arc<str> = Arc::from(listener.name());
        let entity = std::any::type_name::<E>();

        match self.registry.register(listener).await {
            Ok(count) => {
                debug!(entity, listener = %name, count, "listener registered");
                self.bus.publish(
                    EngineEvent::new(EngineEventKind::ListenerRegistered)
                        .with_entity(entity)
                        .with_listener(name),
                );
                Ok(())
            }
            Err(err) => {
                debug!(entity, listener = %name, error = %err, "listener rejected");
                Err(err)
            }
        }
    }

    /// Registers a closure as a `Basic` listener for `E`.
    pub async fn register_fn<E, F>(&self, trigger: F) -> Result<(), EngineError>
    where
        E: Send + Sync + 'static,
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.register::<E>(ListenerFn::arc(trigger)).await
    }

    /// Number of listeners registered for `E`.
    pub async fn listener_count<E>(&self) -> usize
    where
        E: Send + Sync + 'static,
    {
        self.registry.len::<E>().await
    }

    /// Sorted names of entity types with at least one listener.
    pub async fn entities(&self) -> Vec<&'static str> {
        self.registry.entities().await
    }

    // ---------------------------
    // Dispatch
    // ---------------------------

    /// Dispatches `entity` to every listener registered for `E`.
    ///
    /// Returns one [`EventContext`] per listener, in registration order. Waits while the
    /// intake queue is full.
    ///
    /// ### Errors
    /// - [`EngineError::NotFoundEventListener`] if `E` has no listener (nothing is queued).
    /// - [`EngineError::Stopped`] if the engine is, or becomes, stopped. When `stop` lands
    ///   between two listeners of one dispatch, the sets queued before it stay queued (a
    ///   running engine may still claim them) and their contexts are not returned.
    pub async fn dispatch<E>(&self, entity: E) -> Result<Vec<EventContext>, EngineError>
    where
        E: Send + Sync + 'static,
    {
        let sets = self.prepare(entity).await?;
        let mut contexts = Vec::with_capacity(sets.len());

        for set in sets {
            let ctx = set.context().clone();
            let meta = set.meta().clone();
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(EngineError::Stopped),
                res = self.intake.send(set) => res.map_err(|_| EngineError::Stopped)?,
            }
            self.queued(&meta);
            contexts.push(ctx);
        }
        Ok(contexts)
    }

    /// Like [`dispatch`](Self::dispatch) but never waits for queue room.
    ///
    /// Either every dispatch set is queued or none is. When more listeners match than
    /// `intake_capacity`, this always fails with `QueueFull`.
    ///
    /// ### Errors
    /// Those of `dispatch`, plus [`EngineError::QueueFull`] when the intake queue cannot
    /// take all sets right now.
    pub async fn try_dispatch<E>(&self, entity: E) -> Result<Vec<EventContext>, EngineError>
    where
        E: Send + Sync + 'static,
    {
        let entity_name = std::any::type_name::<E>();
        let sets = self.prepare(entity).await?;

        let permits = self.intake.try_reserve_many(sets.len()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => EngineError::QueueFull {
                entity: entity_name,
            },
            mpsc::error::TrySendError::Closed(()) => EngineError::Stopped,
        })?;

        let mut contexts = Vec::with_capacity(sets.len());
        for (permit, set) in permits.zip(sets) {
            let ctx = set.context().clone();
            let meta = set.meta().clone();
            permit.send(set);
            self.queued(&meta);
            contexts.push(ctx);
        }
        Ok(contexts)
    }

    /// Blocking variant of [`dispatch`](Self::dispatch) for callers outside the async runtime.
    ///
    /// Blocks the calling thread while the intake queue is full; resolves to
    /// [`EngineError::Stopped`] if the engine stops meanwhile. Must not be called from
    /// within an async execution context, where it would block a runtime thread.
    pub fn dispatch_blocking<E>(&self, entity: E) -> Result<Vec<EventContext>, EngineError>
    where
        E: Send + Sync + 'static,
    {
        futures::executor::block_on(self.dispatch(entity))
    }

    /// Looks up listeners for `E` and builds one dispatch set per listener.
    async fn prepare<E>(&self, entity: E) -> Result<Vec<Box<dyn Dispatch>>, EngineError>
    where
        E: Send + Sync + 'static,
    {
        if self.is_stopped() {
            // Parent token may have fired with no watcher running.
            self.stop();
            return Err(EngineError::Stopped);
        }
        let listeners = self.registry.lookup::<E>().await;
        Self::build_sets(listeners, entity)
    }

    fn build_sets<E>(
        listeners: Vec<ListenerRef<E>>,
        entity: E,
    ) -> Result<Vec<Box<dyn Dispatch>>, EngineError>
    where
        E: Send + Sync + 'static,
    {
        if listeners.is_empty() {
            return Err(EngineError::NotFoundEventListener {
                entity: std::any::type_name::<E>(),
            });
        }

        let entity = Arc::new(entity);
        Ok(listeners
            .into_iter()
            .map(|l| Box::new(DispatchSet::new(l, Arc::clone(&entity))) as Box<dyn Dispatch>)
            .collect())
    }

    fn queued(&self, meta: &DispatchMeta) {
        trace!(
            entity = meta.entity,
            listener = %meta.listener,
            dispatch_id = meta.id,
            "dispatch queued"
        );
        self.bus.publish(meta.event(EngineEventKind::DispatchQueued));
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Spawns the worker pools on the current Tokio runtime.
    ///
    /// Returns `true` if this call started the engine. Later calls, calls on a stopped
    /// engine, and calls outside a Tokio runtime return `false` and change nothing.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.is_stopped() {
            self.stop();
            warn!("start ignored: engine already stopped");
            return false;
        }
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                error!(error = %err, "start ignored: no tokio runtime");
                return false;
            }
        };
        let Some(pipeline) = lock(&self.pipeline).take() else {
            return false;
        };

        let cfg = &self.cfg;
        for field in cfg.clamped_fields() {
            warn!(field, "non-positive engine setting clamped to 1");
        }
        info!(
            setting = if cfg.is_default() { "default" } else { "customized" },
            intake_capacity = cfg.intake_capacity_clamped(),
            dispense_workers = cfg.dispense_workers_clamped(),
            execution_capacity = cfg.execution_capacity_clamped(),
            execution_workers = cfg.execution_workers_clamped(),
            after_capacity = cfg.after_capacity_clamped(),
            multi_listener = cfg.multi_listener,
            "dispatch engine running"
        );

        self.watch_parent(&runtime);
        let handles = self.spawn_pools(&runtime, pipeline);
        lock(&self.workers).extend(handles);
        self.started.store(true, Ordering::Release);
        self.bus.publish(EngineEvent::new(EngineEventKind::EngineStarted));
        true
    }

    /// Runs `stop` once the parent token fires. At most one watcher per engine; it exits
    /// when the engine is dropped.
    fn watch_parent(self: &Arc<Self>, runtime: &Handle) {
        let Some(alive) = self.alive.clone() else {
            return;
        };
        if self.watching.swap(true, Ordering::AcqRel) {
            return;
        }
        let engine = Arc::downgrade(self);
        let token = self.token.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Some(engine) = engine.upgrade() {
                        engine.stop();
                    }
                }
                _ = alive.cancelled() => {}
            }
        });
    }

    fn spawn_pools(&self, runtime: &Handle, p: Pipeline) -> Vec<JoinHandle<()>> {
        let dispense_workers = self.cfg.dispense_workers_clamped();
        let execution_workers = self.cfg.execution_workers_clamped();
        let mut handles = Vec::with_capacity(dispense_workers + 2 * execution_workers);

        for worker in 0..dispense_workers {
            handles.push(runtime.spawn(dispense::run_worker(
                worker,
                Arc::clone(&p.intake),
                p.execution_tx.clone(),
                self.token.clone(),
                self.bus.clone(),
            )));
        }
        for worker in 0..execution_workers {
            handles.push(runtime.spawn(execution::run_worker(
                worker,
                Arc::clone(&p.execution_rx),
                p.after_tx.clone(),
                self.token.clone(),
                self.bus.clone(),
            )));
            handles.push(runtime.spawn(execution::run_after_worker(
                worker,
                Arc::clone(&p.after_rx),
                self.token.clone(),
                self.bus.clone(),
            )));
        }
        handles
    }

    /// Fires the shared cancellation signal. Idempotent.
    ///
    /// Does not wait for running listeners and abandons queued work.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        // Never started: drop the receivers so blocked senders observe a closed queue.
        drop(lock(&self.pipeline).take());

        info!("dispatch engine stopped");
        self.bus.publish(EngineEvent::new(EngineEventKind::EngineStopped));
    }

    /// Number of worker tasks that have not exited yet.
    pub fn active_workers(&self) -> usize {
        lock(&self.workers)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Waits until every worker spawned so far has exited.
    ///
    /// Only returns after [`stop`](Self::stop) (or once the engine is dropped and the
    /// queues drain).
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "engine worker terminated abnormally");
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cfg", &self.cfg)
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(alive) = &self.alive {
            alive.cancel();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
