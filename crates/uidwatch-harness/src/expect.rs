//! Builder-style expect/assert API over a watcher.
//!
//! [`Expect`] wraps a [`UidWaiter`] (usually borrowed from a
//! [`WatchUidRunner`]) and provides a fluent interface for the common
//! sequence of state transitions a test walks through. Methods are
//! chainable and return `&mut Self`.
//!
//! # Example
//!
//! ```no_run
//! # use uidwatch_harness::{Expect, RunnerOptions, WatchUidRunner};
//! # use uidwatch_types::{procstate, WatchCommand};
//! # use std::time::Duration;
//! # fn example() -> Result<(), uidwatch_harness::HarnessError> {
//! let runner = WatchUidRunner::start(10123, RunnerOptions::for_uid(10123))?;
//! Expect::new(&runner)
//!     .timeout(Duration::from_secs(3))
//!     .wait_for_state(WatchCommand::Procstate, procstate::TOP)?
//!     .wait_for(WatchCommand::Active)?
//!     .wait_for_state(WatchCommand::Procstate, procstate::CACHED_EMPTY)?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use uidwatch_types::WatchCommand;

use crate::error::HarnessError;
use crate::predicate::WatchUidPredicate;
use crate::runner::WatchUidRunner;
use crate::waiter::UidWaiter;

/// A builder for wait/expect operations on one watcher.
pub struct Expect<'a> {
    waiter: &'a UidWaiter,
    timeout: Duration,
}

impl<'a> Expect<'a> {
    /// Wrap a runner, using its default timeout.
    pub fn new(runner: &'a WatchUidRunner) -> Self {
        Self {
            waiter: runner.waiter(),
            timeout: runner.default_timeout(),
        }
    }

    /// Wrap a bare waiter with an explicit timeout.
    pub fn with_waiter(waiter: &'a UidWaiter, timeout: Duration) -> Self {
        Self { waiter, timeout }
    }

    /// Set the timeout for subsequent operations.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Wait for any line of `command`.
    pub fn wait_for(&mut self, command: WatchCommand) -> Result<&mut Self, HarnessError> {
        self.wait_for_predicate(&WatchUidPredicate::new(command), None)
    }

    /// Wait for a `command` line reporting `procstate`.
    pub fn wait_for_state(
        &mut self,
        command: WatchCommand,
        procstate: &str,
    ) -> Result<&mut Self, HarnessError> {
        let expected = WatchUidPredicate::builder(command).procstate(procstate).build();
        self.wait_for_predicate(&expected, None)
    }

    /// Wait for a `command` line with the given capability and, when set,
    /// procstate.
    pub fn wait_for_capability(
        &mut self,
        command: WatchCommand,
        procstate: Option<&str>,
        capability: u32,
    ) -> Result<&mut Self, HarnessError> {
        let expected = WatchUidPredicate::builder(command)
            .maybe_procstate(procstate)
            .capability(capability)
            .build();
        self.wait_for_predicate(&expected, None)
    }

    /// Wait for `expected`, failing at once if `failure` matches first.
    pub fn wait_for_predicate(
        &mut self,
        expected: &WatchUidPredicate,
        failure: Option<&WatchUidPredicate>,
    ) -> Result<&mut Self, HarnessError> {
        self.waiter.wait_for_match(expected, failure, self.timeout)?;
        Ok(self)
    }

    /// The very next data line must be `command` (and `procstate`, if set).
    pub fn expect_next(
        &mut self,
        command: WatchCommand,
        procstate: Option<&str>,
    ) -> Result<&mut Self, HarnessError> {
        self.waiter.expect(command, procstate, self.timeout)?;
        Ok(self)
    }

    /// Forget lines received so far.
    pub fn clear_history(&mut self) -> &mut Self {
        self.waiter.clear_history();
        self
    }
}
