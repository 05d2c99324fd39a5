//! Count-down latches owned by a test session.
//!
//! Lifecycle callbacks (broadcast receivers, service connections) signal
//! the test thread through latches. Keeping them in a [`LatchSet`] that the
//! session owns, instead of in process-wide statics, means one test's
//! leftover signals can never satisfy the next test's wait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::HarnessError;

/// A one-shot count-down latch.
#[derive(Debug)]
pub struct Latch {
    count: Mutex<u32>,
    released: Condvar,
}

impl Latch {
    pub fn new(count: u32) -> Self {
        Self {
            count: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Decrement the count, releasing waiters when it reaches zero.
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            if *count == 0 {
                self.released.notify_all();
            }
        }
    }

    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    /// Block until the count reaches zero. Returns `false` on timeout.
    pub fn await_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.released.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

/// Named latches scoped to one session.
#[derive(Debug, Default)]
pub struct LatchSet {
    latches: Mutex<HashMap<String, Arc<Latch>>>,
}

impl LatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh latch under `name`, replacing any previous one.
    pub fn arm(&self, name: &str, count: u32) -> Arc<Latch> {
        let latch = Arc::new(Latch::new(count));
        self.latches
            .lock()
            .insert(name.to_string(), Arc::clone(&latch));
        latch
    }

    pub fn get(&self, name: &str) -> Option<Arc<Latch>> {
        self.latches.lock().get(name).cloned()
    }

    /// Count down the latch named `name`. Returns `false` if none is armed.
    pub fn count_down(&self, name: &str) -> bool {
        match self.get(name) {
            Some(latch) => {
                latch.count_down();
                true
            }
            None => false,
        }
    }

    /// Wait for the latch named `name` to be released.
    pub fn await_latch(&self, name: &str, timeout: Duration) -> Result<(), HarnessError> {
        let latch = self
            .get(name)
            .ok_or_else(|| HarnessError::Other(format!("no latch armed for {name:?}")))?;
        if latch.await_timeout(timeout) {
            Ok(())
        } else {
            Err(HarnessError::PollTimeout {
                description: format!(
                    "latch {name:?} ({} of its count still outstanding)",
                    latch.count()
                ),
            })
        }
    }

    /// Drop every latch. Callbacks holding an old latch keep working but can
    /// no longer affect waits on newly armed ones.
    pub fn reset(&self) {
        self.latches.lock().clear();
    }
}
