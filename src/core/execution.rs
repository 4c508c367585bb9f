//! # Execution and after stages.
//!
//! Execution workers run claimed dispatch sets and hand any resulting `then`/`catch`
//! action to the after queue. After workers run those actions. The split keeps slow
//! callbacks from holding up listener throughput: each stage can only block on its own queue.
//!
//! ```text
//! execution queue ──► execution worker ──► set.run()
//!                                            ├─ publish outcome (Succeeded / Failed / Panicked)
//!                                            ├─ failed without catch ──► publish ErrorDiscarded
//!                                            └─ Some(action) ──► after queue
//!
//! after queue ──► after worker ──► action.run()
//!                                    └─ panic ──► publish CallbackPanicked
//! ```
//!
//! ## Rules
//! - A running listener is never interrupted; cancellation is observed between items.
//! - Listener errors never leave the pipeline except through `catch`.
//! - Panics in listeners and callbacks are contained; the worker keeps going.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::dispatch::{AfterAction, Dispatch, Execution};
use super::queue::{SharedReceiver, forward, next};
use crate::error::ListenerError;
use crate::events::{Bus, EngineEventKind};

/// Runs one execution worker until cancellation.
pub(crate) async fn run_worker(
    worker: usize,
    execution: SharedReceiver<Box<dyn Dispatch>>,
    after: mpsc::Sender<AfterAction>,
    token: CancellationToken,
    bus: Bus,
) {
    while let Some(set) = next(&execution, &token).await {
        let Execution {
            meta,
            result,
            after: action,
        } = set.run().await;

        match &result {
            Ok(()) => {
                debug!(
                    worker,
                    entity = meta.entity,
                    listener = %meta.listener,
                    dispatch_id = meta.id,
                    "listener succeeded"
                );
                bus.publish(meta.event(EngineEventKind::ListenerSucceeded));
            }
            Err(err @ ListenerError::Panicked { .. }) => {
                error!(
                    worker,
                    entity = meta.entity,
                    listener = %meta.listener,
                    dispatch_id = meta.id,
                    error = %err,
                    "listener panicked"
                );
                bus.publish(
                    meta.event(EngineEventKind::ListenerPanicked).with_reason(err.to_string()),
                );
            }
            Err(err) => {
                debug!(
                    worker,
                    entity = meta.entity,
                    listener = %meta.listener,
                    dispatch_id = meta.id,
                    error = %err,
                    "listener failed"
                );
                bus.publish(
                    meta.event(EngineEventKind::ListenerFailed).with_reason(err.to_string()),
                );
            }
        }

        match action {
            Some(action) => {
                if !forward(&after, action, &token).await {
                    break;
                }
            }
            None => {
                if let Err(err) = &result {
                    bus.publish(
                        meta.event(EngineEventKind::ErrorDiscarded).with_reason(err.to_string()),
                    );
                }
            }
        }
    }

    debug!(worker, "execution worker stopped");
}

/// Runs one after-stage worker until cancellation.
pub(crate) async fn run_after_worker(
    worker: usize,
    after: SharedReceiver<AfterAction>,
    token: CancellationToken,
    bus: Bus,
) {
    while let Some(action) = next(&after, &token).await {
        let kind = action.kind;
        let meta = action.meta.clone();

        if let Err(panic) = action.run().await {
            warn!(
                worker,
                callback = kind.as_str(),
                entity = meta.entity,
                listener = %meta.listener,
                dispatch_id = meta.id,
                panic = %panic,
                "listener callback panicked"
            );
            bus.publish(
                meta.event(EngineEventKind::CallbackPanicked)
                    .with_reason(format!("{}: {panic}", kind.as_str())),
            );
        }
    }

    debug!(worker, "after worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::DispatchSet;
    use crate::core::queue::channel;
    use crate::listeners::{ListenerFn, ListenerRef};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failure_without_catch_is_discarded_not_forwarded() {
        let (exec_tx, exec_rx) = channel::<Box<dyn Dispatch>>(2);
        let (after_tx, after_rx) = channel::<AfterAction>(2);
        let token = CancellationToken::new();
        let bus = Bus::new(16);
        let mut events = bus.subscribe();

        let l: ListenerRef<u8> = Arc::new(ListenerFn::new(|_: &u8| Err(ListenerError::fail("no"))));
        exec_tx
            .send(Box::new(DispatchSet::new(l, Arc::new(0u8))))
            .await
            .unwrap();

        let worker = tokio::spawn(run_worker(0, exec_rx, after_tx, token.clone(), bus));

        assert_eq!(events.recv().await.unwrap().kind, EngineEventKind::ListenerFailed);
        let discarded = events.recv().await.unwrap();
        assert_eq!(discarded.kind, EngineEventKind::ErrorDiscarded);
        assert_eq!(discarded.reason.as_deref(), Some("listener failed: no"));
        assert!(after_rx.lock().await.try_recv().is_err());

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_then_runs_on_after_worker() {
        let (exec_tx, exec_rx) = channel::<Box<dyn Dispatch>>(2);
        let (after_tx, after_rx) = channel::<AfterAction>(2);
        let token = CancellationToken::new();
        let bus = Bus::new(16);

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let l: ListenerRef<u8> = Arc::new(ListenerFn::new(|_: &u8| Ok(())).with_then(move |n| {
            seen.fetch_add(usize::from(*n), Ordering::SeqCst);
        }));
        exec_tx
            .send(Box::new(DispatchSet::new(l, Arc::new(5u8))))
            .await
            .unwrap();

        let exec = tokio::spawn(run_worker(0, exec_rx, after_tx, token.clone(), bus.clone()));
        let after = tokio::spawn(run_after_worker(0, after_rx, token.clone(), bus));

        tokio::time::timeout(Duration::from_secs(1), async {
            while hits.load(Ordering::SeqCst) != 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        exec.await.unwrap();
        after.await.unwrap();
    }

    #[tokio::test]
    async fn test_after_worker_survives_callback_panic() {
        let (exec_tx, exec_rx) = channel::<Box<dyn Dispatch>>(4);
        let (after_tx, after_rx) = channel::<AfterAction>(4);
        let token = CancellationToken::new();
        let bus = Bus::new(16);
        let mut events = bus.subscribe();

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let l: ListenerRef<u8> = Arc::new(ListenerFn::new(|_: &u8| Ok(())).with_then(move |n| {
            if *n == 0 {
                panic!("zero");
            }
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        for n in [0u8, 1u8] {
            exec_tx
                .send(Box::new(DispatchSet::new(l.clone(), Arc::new(n))))
                .await
                .unwrap();
        }

        let exec = tokio::spawn(run_worker(0, exec_rx, after_tx, token.clone(), bus.clone()));
        let after = tokio::spawn(run_after_worker(0, after_rx, token.clone(), bus));

        let panicked = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let ev = events.recv().await.unwrap();
                if ev.kind == EngineEventKind::CallbackPanicked {
                    return ev;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(panicked.reason.as_deref(), Some("then: zero"));

        tokio::time::timeout(Duration::from_secs(1), async {
            while hits.load(Ordering::SeqCst) != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        token.cancel();
        exec.await.unwrap();
        after.await.unwrap();
    }
}
