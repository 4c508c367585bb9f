//! # Dispatch set: one (listener, entity, context) unit of work.
//!
//! A [`DispatchSet`] is built at the `dispatch` call site, where the entity type `E` is
//! statically known, and then travels through the pipeline as a `Box<dyn Dispatch>`.
//! Stages only use the object-safe [`Dispatch`] surface; nothing downstream needs `E`.
//!
//! ## Run policy
//! ```text
//! trigger(&entity)
//!   ├─ Ok  ──► capability has `then`  ? Some(AfterAction::Then)  : None
//!   └─ Err ──► capability has `catch` ? Some(AfterAction::Catch) : None (error discarded)
//! ```
//! - `trigger` runs exactly once per set; the caller (execution stage) only runs sets
//!   that the dispense stage claimed.
//! - A panic inside `trigger` becomes [`ListenerError::Panicked`] and follows the `Err` path.
//! - At most one of `then`/`catch` is produced.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use super::context::EventContext;
use crate::error::{ListenerError, panic_message};
use crate::events::{EngineEvent, EngineEventKind};
use crate::listeners::ListenerRef;

/// Identification of a dispatch set for logs and engine events.
#[derive(Clone, Debug)]
pub(crate) struct DispatchMeta {
    pub(crate) entity: &'static str,
    pub(crate) listener: Arc<str>,
    pub(crate) id: u64,
}

impl DispatchMeta {
    /// Engine event of `kind` carrying this set's entity, listener and dispatch id.
    pub(crate) fn event(&self, kind: EngineEventKind) -> EngineEvent {
        EngineEvent::new(kind)
            .with_entity(self.entity)
            .with_listener(self.listener.clone())
            .with_dispatch_id(self.id)
    }
}

/// Outcome of running one dispatch set.
pub(crate) struct Execution {
    pub(crate) meta: DispatchMeta,
    pub(crate) result: Result<(), ListenerError>,
    pub(crate) after: Option<AfterAction>,
}

/// Which callback an [`AfterAction`] runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AfterKind {
    Then,
    Catch,
}

impl AfterKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AfterKind::Then => "then",
            AfterKind::Catch => "catch",
        }
    }
}

/// Deferred `then`/`catch` invocation, executed by the after stage.
pub(crate) struct AfterAction {
    pub(crate) kind: AfterKind,
    pub(crate) meta: DispatchMeta,
    fut: BoxFuture<'static, ()>,
}

impl AfterAction {
    fn then<E>(meta: DispatchMeta, listener: ListenerRef<E>, entity: Arc<E>) -> Self
    where
        E: Send + Sync + 'static,
    {
        Self {
            kind: AfterKind::Then,
            meta,
            fut: Box::pin(async move { listener.then(&entity).await }),
        }
    }

    fn catch<E>(meta: DispatchMeta, listener: ListenerRef<E>, error: ListenerError) -> Self
    where
        E: Send + Sync + 'static,
    {
        Self {
            kind: AfterKind::Catch,
            meta,
            fut: Box::pin(async move { listener.catch(error).await }),
        }
    }

    /// Runs the callback. A panic is caught and returned as its message.
    pub(crate) async fn run(self) -> Result<(), String> {
        AssertUnwindSafe(self.fut)
            .catch_unwind()
            .await
            .map_err(|payload| panic_message(payload.as_ref()))
    }
}

impl fmt::Debug for AfterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterAction")
            .field("kind", &self.kind)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Type-erased dispatch set as carried by the pipeline queues.
#[async_trait]
pub(crate) trait Dispatch: Send + 'static {
    fn context(&self) -> &EventContext;

    fn meta(&self) -> &DispatchMeta;

    /// Invokes the listener once and derives the deferred action.
    async fn run(self: Box<Self>) -> Execution;
}

/// One (listener, entity, context) triple for entity type `E`.
pub(crate) struct DispatchSet<E> {
    listener: ListenerRef<E>,
    entity: Arc<E>,
    context: EventContext,
    meta: DispatchMeta,
}

impl<E> DispatchSet<E>
where
    E: Send + Sync + 'static,
{
    pub(crate) fn new(listener: ListenerRef<E>, entity: Arc<E>) -> Self {
        let context = EventContext::new();
        let meta = DispatchMeta {
            entity: std::any::type_name::<E>(),
            listener: Arc::from(listener.name()),
            id: context.id(),
        };
        Self {
            listener,
            entity,
            context,
            meta,
        }
    }
}

#[async_trait]
impl<E> Dispatch for DispatchSet<E>
where
    E: Send + Sync + 'static,
{
    fn context(&self) -> &EventContext {
        &self.context
    }

    fn meta(&self) -> &DispatchMeta {
        &self.meta
    }

    async fn run(self: Box<Self>) -> Execution {
        let DispatchSet {
            listener,
            entity,
            meta,
            ..
        } = *self;

        let result = match AssertUnwindSafe(listener.trigger(&entity)).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => Err(ListenerError::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        };

        let capability = listener.capability();
        let after = match &result {
            Ok(()) if capability.has_then() => {
                Some(AfterAction::then(meta.clone(), listener, entity))
            }
            Err(err) if capability.has_catch() => {
                Some(AfterAction::catch(meta.clone(), listener, err.clone()))
            }
            _ => None,
        };

        Execution {
            meta,
            result,
            after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::ListenerFn;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counters {
        trigger: AtomicUsize,
        then: AtomicUsize,
        catch: AtomicUsize,
    }

    fn counters() -> Arc<Counters> {
        Arc::new(Counters {
            trigger: AtomicUsize::new(0),
            then: AtomicUsize::new(0),
            catch: AtomicUsize::new(0),
        })
    }

    fn listener(c: &Arc<Counters>, fail: bool, then: bool, catch: bool) -> ListenerRef<u32> {
        let (ct, cth, cc) = (c.clone(), c.clone(), c.clone());
        let mut l = ListenerFn::new(move |_: &u32| {
            ct.trigger.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(ListenerError::fail("boom"))
            } else {
                Ok(())
            }
        })
        .with_name("counting");
        if then {
            l = l.with_then(move |_| {
                cth.then.fetch_add(1, Ordering::SeqCst);
            });
        }
        if catch {
            l = l.with_catch(move |_| {
                cc.catch.fetch_add(1, Ordering::SeqCst);
            });
        }
        Arc::new(l)
    }

    async fn run_set(l: ListenerRef<u32>) -> Execution {
        let set: Box<dyn Dispatch> = Box::new(DispatchSet::new(l, Arc::new(7u32)));
        set.run().await
    }

    #[tokio::test]
    async fn test_success_with_then_produces_then() {
        let c = counters();
        let exec = run_set(listener(&c, false, true, true)).await;
        assert!(exec.result.is_ok());
        let after = exec.after.expect("then action");
        assert_eq!(after.kind, AfterKind::Then);
        after.run().await.unwrap();
        assert_eq!(c.then.load(Ordering::SeqCst), 1);
        assert_eq!(c.catch.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_with_catch_produces_catch() {
        let c = counters();
        let exec = run_set(listener(&c, true, true, true)).await;
        assert_eq!(exec.result, Err(ListenerError::fail("boom")));
        let after = exec.after.expect("catch action");
        assert_eq!(after.kind, AfterKind::Catch);
        after.run().await.unwrap();
        assert_eq!(c.catch.load(Ordering::SeqCst), 1);
        assert_eq!(c.then.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_without_catch_is_discarded() {
        let c = counters();
        let exec = run_set(listener(&c, true, true, false)).await;
        assert!(exec.result.is_err());
        assert!(exec.after.is_none());
    }

    #[tokio::test]
    async fn test_success_without_then_has_no_action() {
        let c = counters();
        let exec = run_set(listener(&c, false, false, true)).await;
        assert!(exec.result.is_ok());
        assert!(exec.after.is_none());
        assert_eq!(c.trigger.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_trigger_routes_to_catch() {
        let caught = Arc::new(AtomicUsize::new(0));
        let seen = caught.clone();
        let l: ListenerRef<u32> = Arc::new(
            ListenerFn::new(|_: &u32| -> Result<(), ListenerError> { panic!("kaput") })
                .with_catch(move |err| {
                    assert!(err.is_panic());
                    seen.fetch_add(1, Ordering::SeqCst);
                }),
        );

        let exec = run_set(l).await;
        assert_eq!(
            exec.result,
            Err(ListenerError::Panicked {
                message: "kaput".into()
            })
        );
        exec.after.expect("catch action").run().await.unwrap();
        assert_eq!(caught.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_callback_is_reported() {
        let l: ListenerRef<u32> =
            Arc::new(ListenerFn::new(|_: &u32| Ok(())).with_then(|_| panic!("then blew up")));
        let exec = run_set(l).await;
        let err = exec.after.expect("then action").run().await.unwrap_err();
        assert_eq!(err, "then blew up");
    }

    #[test]
    fn test_meta_names_entity_and_listener() {
        let c = counters();
        let set = DispatchSet::new(listener(&c, false, false, false), Arc::new(1u32));
        assert_eq!(set.meta().entity, "u32");
        assert_eq!(&*set.meta().listener, "counting");
        assert_eq!(set.meta().id, set.context().id());
    }

    #[test]
    fn test_meta_event_carries_dispatch_identity() {
        let c = counters();
        let set = DispatchSet::new(listener(&c, false, false, false), Arc::new(1u32));
        let ev = set.meta().event(EngineEventKind::DispatchClaimed);
        assert_eq!(ev.kind, EngineEventKind::DispatchClaimed);
        assert_eq!(ev.entity, Some("u32"));
        assert_eq!(ev.listener.as_deref(), Some("counting"));
        assert_eq!(ev.dispatch_id, Some(set.context().id()));
        assert!(ev.reason.is_none());
    }
}
