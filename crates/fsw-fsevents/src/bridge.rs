//! Routing of native callbacks back to their sessions.
//!
//! Native streams only carry an opaque integer for their owner. This module
//! keeps the process-wide side table from that integer to a strongly held
//! [`BatchTarget`], so a session stays reachable exactly as long as its token
//! is live, and a callback for a torn-down session finds nothing.
//!
//! ```text
//! FSEvents ──(token, batch)──► dispatch ──► side table ──► BatchTarget::on_batch
//! FSEvents ──(token)─────────► release  ──► side table entry removed
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::Span;

use crate::events::RawEvent;

/// Receives raw batches for one correlation token.
pub trait BatchTarget: Send + Sync {
    /// Handles one native batch on the pump thread.
    fn on_batch(&self, events: &[RawEvent]);
}

type TargetTable = FxHashMap<usize, Arc<dyn BatchTarget>>;

static TARGETS: LazyLock<Mutex<TargetTable>> = LazyLock::new(|| Mutex::new(TargetTable::default()));

// Zero is never handed out.
static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);

/// Owned key into the side table.
///
/// Invalidating (or dropping) the token removes the entry; the native release
/// callback may remove it first, in which case invalidation does nothing.
#[derive(Debug)]
pub struct CorrelationToken {
    id: usize,
}

impl CorrelationToken {
    /// Allocates a fresh token that resolves to `target`.
    pub fn register(target: Arc<dyn BatchTarget>) -> Self {
        let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        TARGETS.lock().insert(id, target);
        Self { id }
    }

    /// Returns the integer handed to the native stream.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Removes the side-table entry.
    pub fn invalidate(self) {
        drop(self);
    }
}

impl Drop for CorrelationToken {
    fn drop(&mut self) {
        release(self.id);
    }
}

/// Hands a native batch to the target registered for `token`.
///
/// Returns `false` if the token is unknown (already released or invalidated).
/// The table lock is not held while the target runs, and a panic escaping the
/// target is caught and logged rather than unwinding into native code.
pub fn dispatch(token: usize, events: &[RawEvent]) -> bool {
    let target = TARGETS.lock().get(&token).map(Arc::clone);
    let Some(target) = target else {
        tracing::trace!(token, events = events.len(), "Dropping batch for released token");
        return false;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| target.on_batch(events)));
    if outcome.is_err() {
        tracing::error!(token, "Panic while delivering file system events");
    }
    true
}

/// Drops the side-table entry for `token`. Unknown tokens are ignored.
pub fn release(token: usize) {
    if TARGETS.lock().remove(&token).is_some() {
        tracing::trace!(token, "Released correlation token");
    }
}

/// Returns `true` if `token` currently resolves to a target.
#[cfg(test)]
#[must_use]
pub(crate) fn is_live(token: usize) -> bool {
    TARGETS.lock().contains_key(&token)
}

/// The ambient execution context carried from one batch to the next.
///
/// This is the `tracing` span current on the thread that started the session;
/// batches run inside it so their logs nest under the caller's context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot(Span);

impl ContextSnapshot {
    /// Captures the calling thread's current span.
    #[must_use]
    pub fn capture() -> Self {
        Self(Span::current())
    }

    /// Enters the captured span until the guard is dropped.
    pub fn restore(&self) -> tracing::span::Entered<'_> {
        self.0.enter()
    }

    /// Returns the captured span.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.0
    }
}
