//! Core types shared across all uidwatch crates.
//!
//! Defines the `am watch-uids` event vocabulary (commands, procstate labels,
//! field positions), the runner configuration, and the error type used by
//! the shell bridge and the config loader.

pub mod command;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod procstate;

pub use command::{
    WatchCommand, CAPABILITY_INDEX, CMD_INDEX, MIN_DATA_FIELDS, PROCSTATE_INDEX, UID_INDEX,
};
pub use config::{AdbConfig, WatchConfig, CONFIG_DIRNAME, CONFIG_FILENAME, DEFAULT_READY_PREFIX};
pub use config_loader::{ConfigLoader, ConfigSource, EffectiveConfig};
pub use error::UidWatchError;
