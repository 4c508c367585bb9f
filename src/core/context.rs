//! # Cancellable completion token for one dispatch set.
//!
//! An [`EventContext`] is created per (dispatch, listener) pair. The pipeline keeps one
//! handle, the caller of `dispatch` gets a clone.
//!
//! ## State machine
//! ```text
//!              try_claim()                   cancel()
//! Completed ◄─────────────── Pending ───────────────► Canceled
//! ```
//! Both transitions are a single compare-and-swap out of `Pending`, so exactly one of
//! them can ever win. `cancel()` on a `Completed` context changes nothing and reports
//! `true` ("too late").
//!
//! ## Rules
//! - `Completed` means the dispense stage claimed the set; the listener runs (or ran) exactly once.
//! - `Canceled` means the listener will never run.
//! - Cancellation never interrupts a listener that is already running.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELED: u8 = 2;

/// Global dispatch id counter.
static DISPATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Observable state of an [`EventContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Not yet claimed, not canceled.
    Pending,
    /// Claimed for execution.
    Completed,
    /// Canceled before it was claimed.
    Canceled,
}

struct Inner {
    id: u64,
    state: AtomicU8,
}

/// Caller-facing handle to one dispatch set.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct EventContext {
    inner: Arc<Inner>,
}

impl EventContext {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: DISPATCH_ID.fetch_add(1, Ordering::Relaxed),
                state: AtomicU8::new(PENDING),
            }),
        }
    }

    /// Process-unique id of this dispatch set (used in logs and engine events).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current state.
    pub fn state(&self) -> ContextState {
        match self.inner.state.load(Ordering::Acquire) {
            PENDING => ContextState::Pending,
            COMPLETED => ContextState::Completed,
            _ => ContextState::Canceled,
        }
    }

    /// True while the set can still be claimed (neither claimed nor canceled).
    pub fn is_runnable(&self) -> bool {
        self.state() == ContextState::Pending
    }

    /// True once the set has been claimed for execution.
    pub fn is_done(&self) -> bool {
        self.state() == ContextState::Completed
    }

    /// True if the set was canceled before it was claimed.
    pub fn is_canceled(&self) -> bool {
        self.state() == ContextState::Canceled
    }

    /// Requests cancellation.
    ///
    /// Returns `true` if the set had already been claimed (cancellation had no effect),
    /// `false` otherwise. Idempotent.
    pub fn cancel(&self) -> bool {
        match self.inner.state.compare_exchange(
            PENDING,
            CANCELED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => false,
            Err(actual) => actual == COMPLETED,
        }
    }

    /// Claims the right to execute. Succeeds at most once, and never after `cancel`.
    pub(crate) fn try_claim(&self) -> bool {
        self.inner
            .state
            .compare_exchange(PENDING, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
