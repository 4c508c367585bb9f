//! # Dispense stage: claim or drop.
//!
//! Dispense workers take dispatch sets from the intake queue and claim them
//! ([`EventContext::try_claim`](super::context::EventContext)). Claimed sets move on to
//! the execution queue; sets canceled before the claim are dropped on the spot.
//!
//! ```text
//! intake queue ──► dispense worker ──► try_claim()
//!                                        ├─ true  ──► publish DispatchClaimed ──► execution queue
//!                                        └─ false ──► publish DispatchDropped  (no retry)
//! ```
//!
//! ## Rules
//! - A dropped set produces no callback and no retry.
//! - On cancellation the worker exits; sets still queued (or a claimed set waiting for
//!   room in the execution queue) are abandoned.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::dispatch::Dispatch;
use super::queue::{SharedReceiver, forward, next};
use crate::events::{Bus, EngineEventKind};

/// Runs one dispense worker until cancellation.
pub(crate) async fn run_worker(
    worker: usize,
    intake: SharedReceiver<Box<dyn Dispatch>>,
    execution: mpsc::Sender<Box<dyn Dispatch>>,
    token: CancellationToken,
    bus: Bus,
) {
    while let Some(set) = next(&intake, &token).await {
        if set.context().try_claim() {
            debug!(
                worker,
                entity = set.meta().entity,
                listener = %set.meta().listener,
                dispatch_id = set.meta().id,
                "dispatch claimed"
            );
            bus.publish(set.meta().event(EngineEventKind::DispatchClaimed));

            if !forward(&execution, set, &token).await {
                break;
            }
        } else {
            debug!(
                worker,
                entity = set.meta().entity,
                listener = %set.meta().listener,
                dispatch_id = set.meta().id,
                "dispatch canceled before claim, dropped"
            );
            bus.publish(set.meta().event(EngineEventKind::DispatchDropped));
        }
    }

    debug!(worker, "dispense worker stopped");
}
