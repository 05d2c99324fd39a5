//! Shell-command bridge for line-oriented watcher processes.
//!
//! Launches a long-lived privileged command (normally
//! `adb shell am watch-uids --oom <uid>`), confirms it printed its ready
//! banner, and exposes its stdout as a buffered line source and its stdin
//! as a control channel.
//!
//! - [`command::ShellCommand`]: argv builder for the watcher command
//! - [`bridge::ShellBridge`]: the running child process and its pipes
//! - [`bridge::LineSource`]: the stdout half handed to a reader thread

pub mod bridge;
pub mod command;

pub use bridge::{LineSource, ShellBridge};
pub use command::ShellCommand;
