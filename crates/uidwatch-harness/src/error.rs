//! Error types for the harness crate.

use uidwatch_types::UidWatchError;

/// Errors surfaced by waits, assertions and runner lifecycle operations.
///
/// Every variant names the subject uid and what was expected so a failing
/// test is actionable from its message alone.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// No matching line arrived before the deadline.
    #[error("timed out waiting for next line: uid={uid} {expected}")]
    Timeout {
        /// The uid being watched.
        uid: u32,
        /// Description of the awaited event.
        expected: String,
    },
    /// A polled condition never held.
    #[error("timeout waiting for: {description}")]
    PollTimeout { description: String },
    /// A line matching the failure predicate arrived first.
    #[error("unexpected line hit: uid={uid} {unexpected} (expected: {expected}) line={line}")]
    UnexpectedLine {
        uid: u32,
        /// The offending line, rendered as `[a, b, c]`.
        line: String,
        /// The failure predicate that matched.
        unexpected: String,
        /// The predicate that was being waited for.
        expected: String,
    },
    /// A strict next-line expectation did not hold.
    #[error("{message}")]
    Mismatch { uid: u32, message: String },
    /// The watcher's output stream ended or failed while waiting.
    #[error("watch stream closed for uid {uid}: {reason}")]
    StreamClosed { uid: u32, reason: String },
    /// The runner was finished while a wait was in progress.
    #[error("watcher for uid {uid} was finished")]
    Finished { uid: u32 },
    /// The watcher never printed its ready banner.
    #[error("watcher not ready: {0}")]
    NotReady(UidWatchError),
    /// An error from the shell bridge or configuration.
    #[error(transparent)]
    Watch(#[from] UidWatchError),
    /// A catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl HarnessError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HarnessError::Timeout { .. } | HarnessError::PollTimeout { .. }
        )
    }
}
