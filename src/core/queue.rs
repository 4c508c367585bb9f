//! # Bounded stage queues shared by a worker pool.
//!
//! Every stage is a bounded `tokio::sync::mpsc` channel. A pool of workers shares the
//! single receiver behind an async mutex; whoever holds the lock waits for the next item,
//! the others wait for the lock. FIFO order is preserved per queue.
//!
//! Both helpers race the queue operation against the engine's cancellation token:
//! - [`next`] returns `None` once the token fires (or the queue closes);
//! - [`forward`] returns `false` once the token fires (or the receiver is gone),
//!   dropping the item it was holding.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Receiver end shared by all workers of one stage.
pub(crate) type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Creates a bounded queue whose receiver is ready to be shared by a pool.
pub(crate) fn channel<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, Arc::new(Mutex::new(rx)))
}

/// Takes the next item, or `None` on cancellation or closed queue.
pub(crate) async fn next<T>(rx: &SharedReceiver<T>, token: &CancellationToken) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        item = async { rx.lock().await.recv().await } => item,
    }
}

/// Pushes `item` into the next stage, waiting for room. `false` on cancellation or closed queue.
pub(crate) async fn forward<T>(tx: &mpsc::Sender<T>, item: T, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        res = tx.send(item) => res.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_next_preserves_fifo() {
        let (tx, rx) = channel::<u32>(4);
        let token = CancellationToken::new();
        for i in 0..4 {
            assert!(forward(&tx, i, &token).await);
        }
        for i in 0..4 {
            assert_eq!(next(&rx, &token).await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_next_returns_none_on_cancel() {
        let (_tx, rx) = channel::<u32>(1);
        let token = CancellationToken::new();
        let waiter = {
            let (rx, token) = (rx.clone(), token.clone());
            tokio::spawn(async move { next(&rx, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forward_gives_up_on_full_queue_when_cancelled() {
        let (tx, _rx) = channel::<u32>(1);
        let token = CancellationToken::new();
        assert!(forward(&tx, 1, &token).await);

        let blocked = {
            let (tx, token) = (tx.clone(), token.clone());
            tokio::spawn(async move { forward(&tx, 2, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!blocked.is_finished());

        token.cancel();
        assert!(!blocked.await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let (tx, rx) = channel::<u8>(0);
        let token = CancellationToken::new();
        assert!(forward(&tx, 9, &token).await);
        assert_eq!(next(&rx, &token).await, Some(9));
    }
}
