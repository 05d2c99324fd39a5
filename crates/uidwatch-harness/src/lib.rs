//! Polling-assertion harness for `am watch-uids` style event streams.
//!
//! A [`WatchUidRunner`] launches the watcher command, parses its output on a
//! dedicated reader thread into a FIFO [`PendingQueue`], and lets the test
//! thread block until a line matching a [`WatchUidPredicate`] arrives, a
//! known-wrong line arrives, or a deadline passes.
//!
//! # Overview
//!
//! - [`RawLine`]: one tokenized output line, comment or data
//! - [`PendingQueue`]: lock + condvar queue between reader and waiter
//! - [`WatchUidPredicate`]: pure matcher over one data line
//! - [`UidWaiter`]: the match / fail / skip wait loop over a queue
//! - [`WatchUidRunner`]: the watcher session and its wait operations
//! - [`Expect`]: builder-style assertion surface over a runner
//! - [`poll`], [`dump`], [`latch`], [`outcome`]: the polling check, the
//!   `key=value` dump parser, session-owned latches and single-shot
//!   completions used alongside the runner
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use uidwatch_harness::{Expect, RunnerOptions, WatchUidRunner};
//! use uidwatch_types::{procstate, WatchCommand};
//!
//! let runner = WatchUidRunner::start(10123, RunnerOptions::for_uid(10123)).unwrap();
//! Expect::new(&runner)
//!     .timeout(Duration::from_secs(5))
//!     .wait_for_state(WatchCommand::Procstate, procstate::TOP)
//!     .unwrap();
//! runner.finish().unwrap();
//! ```

pub mod dump;
pub mod error;
pub mod expect;
pub mod latch;
pub mod line;
pub mod outcome;
pub mod poll;
pub mod predicate;
pub mod queue;
pub mod runner;
pub mod waiter;

pub use error::HarnessError;
pub use expect::Expect;
pub use line::{Classified, LineKind, RawLine};
pub use predicate::WatchUidPredicate;
pub use queue::{CloseReason, PendingQueue, PopResult};
pub use runner::{RunnerOptions, WatchUidRunner};
pub use waiter::UidWaiter;
