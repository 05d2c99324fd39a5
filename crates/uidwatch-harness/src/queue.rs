//! FIFO hand-off between the reader thread and the waiting test thread.
//!
//! All state sits behind one [`parking_lot::Mutex`]; waiters block on a
//! [`parking_lot::Condvar`] against an absolute deadline. The queue is
//! unbounded so the reader never blocks on the consumer.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::line::RawLine;

/// Why the producer side stopped delivering lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The command's output reached end of stream.
    Eof,
    /// Reading the output failed.
    Io(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Eof => write!(f, "end of stream"),
            CloseReason::Io(msg) => write!(f, "read failed: {msg}"),
        }
    }
}

/// Outcome of a blocking pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopResult {
    Line(RawLine),
    TimedOut,
    /// Nothing is queued and the producer has closed.
    Closed(CloseReason),
    /// The session is being torn down.
    Stopped,
}

#[derive(Debug, Default)]
struct QueueState {
    lines: VecDeque<RawLine>,
    stopping: bool,
    closed: Option<CloseReason>,
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and wake all waiters.
    ///
    /// Returns `false` without queueing once the queue is stopping; the
    /// reader takes that as its signal to exit.
    pub fn push(&self, line: RawLine) -> bool {
        let mut state = self.state.lock();
        if state.stopping {
            return false;
        }
        state.lines.push_back(line);
        self.available.notify_all();
        true
    }

    /// Remove the oldest line, waiting until one arrives or `deadline`.
    ///
    /// Lines queued before a close are still delivered; the close is only
    /// reported once the queue has drained. A stop wins over everything.
    pub fn pop_until(&self, deadline: Instant) -> PopResult {
        let mut state = self.state.lock();
        loop {
            if state.stopping {
                return PopResult::Stopped;
            }
            if let Some(line) = state.lines.pop_front() {
                return PopResult::Line(line);
            }
            if let Some(reason) = &state.closed {
                return PopResult::Closed(reason.clone());
            }
            if Instant::now() >= deadline {
                return PopResult::TimedOut;
            }
            // Spurious wakeups and racing producers are handled by looping.
            let _ = self.available.wait_until(&mut state, deadline);
        }
    }

    /// Record that no more lines will arrive and wake waiters.
    ///
    /// Only the first close is kept.
    pub fn close(&self, reason: CloseReason) {
        let mut state = self.state.lock();
        if state.closed.is_none() {
            state.closed = Some(reason);
        }
        self.available.notify_all();
    }

    /// Begin teardown: refuse further lines and release all waiters.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopping = true;
        self.available.notify_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.state.lock().stopping
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.state.lock().closed.clone()
    }

    /// Discard everything queued so far.
    pub fn clear(&self) {
        self.state.lock().lines.clear();
    }

    /// Remove and return everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<RawLine> {
        self.state.lock().lines.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().lines.is_empty()
    }
}
