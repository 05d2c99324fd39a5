//! Error types shared across all uidwatch crates.

/// Errors that can occur outside the waiting harness itself.
///
/// Each variant corresponds to a different subsystem: the shell-command
/// bridge, configuration loading, or protocol parsing.
#[derive(Debug, thiserror::Error)]
pub enum UidWatchError {
    #[error("shell command error: {0}")]
    ShellError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("parse error: {0}")]
    ParseError(String),
}
