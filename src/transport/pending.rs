//! Outstanding work counter.
//!
//! [`InFlight`] counts tasks that have started but not finished and lets
//! a closer wait until the count drops to zero. Each task holds a
//! [`PendingGuard`]; the count is decremented when the guard drops, so a
//! task that returns early or panics is still accounted for.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

// ============================================================================
// InFlight
// ============================================================================

/// Count of outstanding tasks with an idle signal.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one task. The task is finished when the guard drops.
    #[must_use = "the task is counted only while the guard is alive"]
    pub fn enter(self: &Arc<Self>) -> PendingGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        PendingGuard {
            owner: Arc::clone(self),
        }
    }

    /// Returns the number of outstanding tasks.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Waits until no task is outstanding.
    ///
    /// Returns immediately when the count is already zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a drop between check and await is seen.
            notified.as_mut().enable();

            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn leave(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Marks one outstanding task.
#[derive(Debug)]
pub struct PendingGuard {
    owner: Arc<InFlight>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.owner.leave();
    }
}

// ============================================================================
// Tests
// ============================================================================
