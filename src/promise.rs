//! Single-assignment asynchronous result cell.
//!
//! A [`Promise`] decouples "an operation is running" from "notify on
//! completion". The producer side holds a [`Resolver`], the consumer side
//! registers exactly one callback with [`Promise::on_complete`] (or awaits
//! [`Promise::wait`], which is built on it).
//!
//! # Contract
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Callback registered, then resolved | Callback spawned at resolve time |
//! | Resolved, then callback registered | Callback scheduled immediately |
//! | Second resolve | Impossible, [`Resolver::resolve`] consumes the resolver |
//! | Resolve after the promise was dropped | Value handed back as `Err(value)` |
//! | Resolver dropped unresolved | Callback receives [`Error::PromiseAbandoned`] |
//!
//! Callbacks never run while the cell lock is held, and a resolve never
//! waits for the callback to finish: the callback is spawned on the tokio
//! runtime that was current when it was registered.
//!
//! # Example
//!
//! ```ignore
//! let (resolver, promise) = tilegate::promise::channel();
//!
//! std::thread::spawn(move || {
//!     let _ = resolver.resolve(42);
//! });
//!
//! assert_eq!(promise.wait().await?, 42);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::mem;
use std::result::Result as StdResult;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Completion callback. Receives the resolved value, or
/// [`Error::PromiseAbandoned`] if the producer went away.
type Callback<T> = Box<dyn FnOnce(Result<T>) + Send + 'static>;

/// Lifecycle of the shared cell.
enum State<T> {
    /// Neither side has acted yet.
    Unset,
    /// Consumer registered, producer still running.
    Waiting {
        callback: Callback<T>,
        runtime: Option<Handle>,
    },
    /// Producer resolved, no consumer yet.
    Resolved(T),
    /// Producer dropped its resolver, no consumer yet.
    Abandoned,
    /// Value delivered, or the consumer is gone.
    Done,
}

impl<T> State<T> {
    fn name(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Waiting { .. } => "waiting",
            Self::Resolved(_) => "resolved",
            Self::Abandoned => "abandoned",
            Self::Done => "done",
        }
    }
}

type Cell<T> = Arc<Mutex<State<T>>>;

// ============================================================================
// Constructors
// ============================================================================

/// Creates an unresolved promise and its resolver.
#[must_use]
pub fn channel<T: Send + 'static>() -> (Resolver<T>, Promise<T>) {
    let cell: Cell<T> = Arc::new(Mutex::new(State::Unset));
    (
        Resolver {
            cell: Some(Arc::clone(&cell)),
        },
        Promise { cell: Some(cell) },
    )
}

// ============================================================================
// Resolver
// ============================================================================

/// Producer half of a [`Promise`]. Resolving consumes it.
pub struct Resolver<T: Send + 'static> {
    cell: Option<Cell<T>>,
}

impl<T: Send + 'static> Resolver<T> {
    /// Resolves the promise with `value`.
    ///
    /// Never blocks on the consumer's callback.
    ///
    /// # Errors
    ///
    /// Returns the value back if the consumer dropped the promise without
    /// registering a callback.
    pub fn resolve(mut self, value: T) -> StdResult<(), T> {
        let Some(cell) = self.cell.take() else {
            return Err(value);
        };

        let mut state = cell.lock();
        match mem::replace(&mut *state, State::Done) {
            State::Unset => {
                *state = State::Resolved(value);
                Ok(())
            }
            State::Waiting { callback, runtime } => {
                drop(state);
                dispatch(runtime, callback, Ok(value));
                Ok(())
            }
            State::Done => {
                trace!("Promise resolved after its consumer went away");
                Err(value)
            }
            other => {
                *state = other;
                Err(value)
            }
        }
    }
}

impl<T: Send + 'static> Drop for Resolver<T> {
    fn drop(&mut self) {
        let Some(cell) = self.cell.take() else {
            return;
        };

        let mut state = cell.lock();
        match mem::replace(&mut *state, State::Done) {
            State::Unset => *state = State::Abandoned,
            State::Waiting { callback, runtime } => {
                drop(state);
                dispatch(runtime, callback, Err(Error::PromiseAbandoned));
            }
            other => *state = other,
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("pending", &self.cell.is_some())
            .finish()
    }
}

// ============================================================================
// Promise
// ============================================================================

/// Consumer half: an asynchronous result with exactly one callback.
pub struct Promise<T: Send + 'static> {
    cell: Option<Cell<T>>,
}

impl<T: Send + 'static> Promise<T> {
    /// Creates a promise that is already resolved with `value`.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self {
            cell: Some(Arc::new(Mutex::new(State::Resolved(value)))),
        }
    }

    /// Runs `work` on the blocking worker pool and resolves with its result.
    ///
    /// If `work` panics the resolver is dropped and the consumer observes
    /// [`Error::PromiseAbandoned`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_blocking<F>(work: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (resolver, promise) = channel();
        tokio::task::spawn_blocking(move || {
            let _ = resolver.resolve(work());
        });
        promise
    }

    /// Returns `true` once a value has arrived and not yet been delivered.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.cell
            .as_ref()
            .is_some_and(|cell| matches!(*cell.lock(), State::Resolved(_)))
    }

    /// Registers the single completion callback.
    ///
    /// If the promise is already resolved the callback is scheduled right
    /// away; otherwise it is spawned when the producer resolves. Outside a
    /// tokio runtime the callback runs inline on whichever thread completes
    /// the promise.
    pub fn on_complete<F>(mut self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let Some(cell) = self.cell.take() else {
            return;
        };
        let runtime = Handle::try_current().ok();

        let mut state = cell.lock();
        match mem::replace(&mut *state, State::Done) {
            State::Unset => {
                *state = State::Waiting {
                    callback: Box::new(callback),
                    runtime,
                };
            }
            State::Resolved(value) => {
                drop(state);
                dispatch(runtime, Box::new(callback), Ok(value));
            }
            State::Abandoned => {
                drop(state);
                dispatch(runtime, Box::new(callback), Err(Error::PromiseAbandoned));
            }
            other => *state = other,
        }
    }

    /// Waits for the value without holding a thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PromiseAbandoned`] if the resolver was dropped
    /// unresolved.
    pub async fn wait(self) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await?
    }
}

impl<T: Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        // Dropped without a callback: later resolves hand the value back.
        if let Some(cell) = self.cell.take() {
            *cell.lock() = State::Done;
        }
    }
}

impl<T: Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .cell
            .as_ref()
            .map_or("consumed", |cell| cell.lock().name());
        f.debug_struct("Promise").field("state", &state).finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Runs a callback off the caller's stack when a runtime is available.
fn dispatch<T: Send + 'static>(runtime: Option<Handle>, callback: Callback<T>, outcome: Result<T>) {
    match runtime {
        Some(handle) => {
            handle.spawn(async move { callback(outcome) });
        }
        None => callback(outcome),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::timeout;

    #[tokio::test]
    async fn test_callback_registered_before_resolve() {
        let (resolver, promise) = channel::<u32>();
        let (tx, rx) = oneshot::channel();

        promise.on_complete(move |value| {
            let _ = tx.send(value.expect("resolved"));
        });
        resolver.resolve(7).expect("consumer present");

        assert_eq!(rx.await.expect("callback fired"), 7);
    }

    #[tokio::test]
    async fn test_callback_registered_after_resolve() {
        let (resolver, promise) = channel::<&'static str>();
        resolver.resolve("tile").expect("consumer present");
        assert!(promise.is_resolved());

        let (tx, rx) = oneshot::channel();
        promise.on_complete(move |value| {
            let _ = tx.send(value.expect("resolved"));
        });

        assert_eq!(rx.await.expect("callback fired"), "tile");
    }

    #[tokio::test]
    async fn test_callback_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));

        for resolve_first in [true, false] {
            let (resolver, promise) = channel::<usize>();
            let (tx, rx) = oneshot::channel();
            let counter = Arc::clone(&fired);

            let register = move || {
                promise.on_complete(move |value| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(value.expect("resolved"));
                });
            };

            if resolve_first {
                resolver.resolve(1).expect("consumer present");
                register();
            } else {
                register();
                resolver.resolve(1).expect("consumer present");
            }

            assert_eq!(rx.await.expect("callback fired"), 1);
        }

        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_from_foreign_thread() {
        let (resolver, promise) = channel::<Vec<u8>>();
        let (tx, rx) = oneshot::channel();

        promise.on_complete(move |value| {
            let _ = tx.send(value.expect("resolved"));
        });

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            resolver.resolve(vec![1, 2, 3]).expect("consumer present");
        })
        .join()
        .expect("thread joined");

        let value = timeout(Duration::from_secs(2), rx)
            .await
            .expect("callback in time")
            .expect("callback fired");
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_resolve_after_consumer_dropped() {
        let (resolver, promise) = channel::<u8>();
        drop(promise);
        assert_eq!(resolver.resolve(9), Err(9));
    }

    #[tokio::test]
    async fn test_abandoned_resolver() {
        let (resolver, promise) = channel::<u8>();
        drop(resolver);

        let result = promise.wait().await;
        assert!(matches!(result, Err(Error::PromiseAbandoned)));
    }

    #[tokio::test]
    async fn test_abandoned_while_waiting() {
        let (resolver, promise) = channel::<u8>();
        let waiter = tokio::spawn(promise.wait());

        tokio::task::yield_now().await;
        drop(resolver);

        let result = waiter.await.expect("task joined");
        assert!(matches!(result, Err(Error::PromiseAbandoned)));
    }

    #[tokio::test]
    async fn test_spawn_blocking_resolves() {
        let promise = Promise::spawn_blocking(|| 6 * 7);
        assert_eq!(promise.wait().await.expect("resolved"), 42);
    }

    #[tokio::test]
    async fn test_spawn_blocking_panic_abandons() {
        let promise: Promise<u8> = Promise::spawn_blocking(|| panic!("backend fault"));
        assert!(matches!(promise.wait().await, Err(Error::PromiseAbandoned)));
    }

    #[test]
    fn test_resolved_without_runtime_runs_inline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        Promise::resolved(3_u8).on_complete(move |value| {
            assert_eq!(value.expect("resolved"), 3);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_reports_state() {
        let (resolver, promise) = channel::<u8>();
        assert!(format!("{promise:?}").contains("unset"));
        resolver.resolve(1).expect("consumer present");
        assert!(format!("{promise:?}").contains("resolved"));
    }
}
