//! Single-shot completion channel with cooperative cancellation.
//!
//! Helper services report asynchronous results through callbacks. Here a
//! callback site holds a [`Completer`] and the test thread holds the
//! matching [`Outcome`]. Exactly one result can be delivered. Cancellation
//! is a flag: the worker checks it at points of its choosing via
//! [`Completer::check_cancelled`], and a blocked [`Outcome::wait`] wakes
//! as soon as it is set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Why no value came out of an [`Outcome`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum OutcomeError<E> {
    #[error("operation failed: {0}")]
    Failed(E),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("timed out after {0:?} waiting for completion")]
    TimedOut(Duration),
    #[error("completer dropped without completing")]
    Dropped,
    #[error("outcome already consumed")]
    Consumed,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("outcome already completed")]
pub struct AlreadyCompleted;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("operation was cancelled")]
pub struct Cancelled;

enum Slot<T, E> {
    Pending,
    Done(Result<T, E>),
    Taken,
    Abandoned,
}

struct Shared<T, E> {
    slot: Mutex<Slot<T, E>>,
    changed: Condvar,
    cancelled: AtomicBool,
}

trait Cancel: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

impl<T: Send, E: Send> Cancel for Shared<T, E> {
    fn cancel(&self) {
        // Set under the lock so a waiter cannot miss the wakeup.
        let _slot = self.slot.lock();
        self.cancelled.store(true, Ordering::SeqCst);
        self.changed.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cloneable handle that requests cancellation of one operation.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<dyn Cancel>,
}

impl CancellationToken {
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Producer half: delivers the result once.
pub struct Completer<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// Consumer half: waits for the result.
pub struct Outcome<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// Create a connected completer/outcome pair.
pub fn channel<T, E>() -> (Completer<T, E>, Outcome<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending),
        changed: Condvar::new(),
        cancelled: AtomicBool::new(false),
    });
    (
        Completer {
            shared: Arc::clone(&shared),
        },
        Outcome { shared },
    )
}

impl<T, E> Completer<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Deliver the result. Only the first call has any effect.
    pub fn complete(&self, result: Result<T, E>) -> Result<(), AlreadyCompleted> {
        let mut slot = self.shared.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return Err(AlreadyCompleted);
        }
        *slot = Slot::Done(result);
        self.shared.changed.notify_all();
        Ok(())
    }

    pub fn succeed(&self, value: T) -> Result<(), AlreadyCompleted> {
        self.complete(Ok(value))
    }

    pub fn fail(&self, error: E) -> Result<(), AlreadyCompleted> {
        self.complete(Err(error))
    }

    /// Cancellation checkpoint for the worker.
    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        if self.shared.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken {
            inner: self.shared.clone(),
        }
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Abandoned;
            self.shared.changed.notify_all();
        }
    }
}

impl<T, E> Outcome<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn cancellation_token(&self) -> CancellationToken {
        CancellationToken {
            inner: self.shared.clone(),
        }
    }

    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Block until a result is delivered, the operation is cancelled, the
    /// completer is dropped, or `timeout` passes.
    ///
    /// A delivered result wins over a cancellation that raced with it.
    pub fn wait(&self, timeout: Duration) -> Result<T, OutcomeError<E>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            match std::mem::replace(&mut *slot, Slot::Taken) {
                Slot::Done(Ok(value)) => return Ok(value),
                Slot::Done(Err(e)) => return Err(OutcomeError::Failed(e)),
                Slot::Taken => return Err(OutcomeError::Consumed),
                Slot::Abandoned => {
                    *slot = Slot::Abandoned;
                    return Err(OutcomeError::Dropped);
                }
                Slot::Pending => *slot = Slot::Pending,
            }
            if self.shared.is_cancelled() {
                return Err(OutcomeError::Cancelled);
            }
            if self.shared.changed.wait_until(&mut slot, deadline).timed_out()
                && matches!(*slot, Slot::Pending)
                && !self.shared.is_cancelled()
            {
                return Err(OutcomeError::TimedOut(timeout));
            }
        }
    }
}
