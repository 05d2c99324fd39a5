//! The predicate-matching wait loop.
//!
//! [`UidWaiter`] is the consumer side of a [`PendingQueue`]. It knows
//! nothing about processes: the runner feeds the queue from the watcher's
//! output, and tests can feed it directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use uidwatch_types::WatchCommand;

use crate::error::HarnessError;
use crate::line::RawLine;
use crate::predicate::WatchUidPredicate;
use crate::queue::{PendingQueue, PopResult};

/// Waits on queued watcher lines for one subject uid.
#[derive(Debug, Clone)]
pub struct UidWaiter {
    uid: u32,
    queue: Arc<PendingQueue>,
}

impl UidWaiter {
    pub fn new(uid: u32, queue: Arc<PendingQueue>) -> Self {
        Self { uid, queue }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    /// Next data line, skipping (and logging) comments.
    ///
    /// `expected` only feeds the timeout message.
    pub fn next_line(
        &self,
        deadline: Instant,
        expected: &WatchUidPredicate,
    ) -> Result<RawLine, HarnessError> {
        loop {
            match self.queue.pop_until(deadline) {
                PopResult::Line(line) if line.is_comment() => {
                    debug!(uid = self.uid, note = line.field(0).unwrap_or_default(), "note");
                }
                PopResult::Line(line) => {
                    trace!(uid = self.uid, line = %line, "line");
                    return Ok(line);
                }
                PopResult::TimedOut => {
                    let err = HarnessError::Timeout {
                        uid: self.uid,
                        expected: expected.to_string(),
                    };
                    debug!(error = %err, "wait timed out");
                    return Err(err);
                }
                PopResult::Closed(reason) => {
                    warn!(uid = self.uid, reason = %reason, "watch stream closed while waiting");
                    return Err(HarnessError::StreamClosed {
                        uid: self.uid,
                        reason: reason.to_string(),
                    });
                }
                PopResult::Stopped => return Err(HarnessError::Finished { uid: self.uid }),
            }
        }
    }

    /// Strict expectation: the very next data line must be `command` and,
    /// when given, report `procstate`.
    ///
    /// On mismatch the rest of the queue is drained into the log before
    /// the error is returned.
    pub fn expect(
        &self,
        command: WatchCommand,
        procstate: Option<&str>,
        timeout: Duration,
    ) -> Result<RawLine, HarnessError> {
        let expected = WatchUidPredicate::builder(command)
            .maybe_procstate(procstate)
            .build();
        let deadline = Instant::now() + timeout;
        let line = self.next_line(deadline, &expected)?;

        if line.command() != Some(command.as_str()) {
            return Err(self.mismatch(format!(
                "Expected cmd {command} uid {} but next report was {line}",
                self.uid
            )));
        }
        if let Some(state) = procstate {
            if line.procstate() != Some(state) {
                return Err(self.mismatch(format!(
                    "Expected procstate {state} uid {} but next report was {line}",
                    self.uid
                )));
            }
        }
        debug!(uid = self.uid, line = %line, "got expected");
        Ok(line)
    }

    fn mismatch(&self, message: String) -> HarnessError {
        debug!(uid = self.uid, "{message}");
        self.log_remaining_lines();
        HarnessError::Mismatch {
            uid: self.uid,
            message,
        }
    }

    /// Wait until a line satisfies `expected`.
    ///
    /// Each line is tested against `expected` first, so a line satisfying
    /// both predicates counts as a match. A line satisfying only `failure`
    /// ends the wait at once with [`HarnessError::UnexpectedLine`]. Anything
    /// else is logged and skipped. `timeout` bounds the whole wait, not
    /// each line.
    pub fn wait_for_match(
        &self,
        expected: &WatchUidPredicate,
        failure: Option<&WatchUidPredicate>,
        timeout: Duration,
    ) -> Result<RawLine, HarnessError> {
        let failure_desc = failure.map_or_else(|| "none".to_string(), ToString::to_string);
        info!(
            uid = self.uid,
            expected = %expected,
            failure = %failure_desc,
            timeout_ms = timeout.as_millis() as u64,
            "waiting for line"
        );
        let deadline = Instant::now() + timeout;
        loop {
            let line = self.next_line(deadline, expected)?;
            if expected.test(&line) {
                debug!(uid = self.uid, line = %line, "waited for");
                return Ok(line);
            }
            if let Some(failure) = failure.filter(|f| f.test(&line)) {
                let err = HarnessError::UnexpectedLine {
                    uid: self.uid,
                    line: line.to_string(),
                    unexpected: failure.to_string(),
                    expected: expected.to_string(),
                };
                debug!(error = %err, "failure predicate matched");
                return Err(err);
            }
            debug!(
                uid = self.uid,
                line = %line,
                "skipping because not {}",
                expected.command()
            );
        }
    }

    /// Drain whatever is still queued into the debug log.
    pub fn log_remaining_lines(&self) {
        for line in self.queue.drain() {
            if line.is_comment() {
                debug!(uid = self.uid, "remaining: {}", line.field(0).unwrap_or_default());
            } else {
                debug!(uid = self.uid, "remaining: {line}");
            }
        }
    }

    /// Forget every line received so far.
    pub fn clear_history(&self) {
        self.queue.clear();
    }
}
