//! Runner configuration.
//!
//! [`WatchConfig`] holds the timeouts and transport settings used when a
//! watcher is launched. It is normally produced by
//! [`ConfigLoader`](crate::ConfigLoader), which layers config files and
//! `UIDWATCH_*` environment variables over [`WatchConfig::default`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directory name (under `$HOME` or the workspace) holding config files.
pub const CONFIG_DIRNAME: &str = ".uidwatch";
/// Config file name inside [`CONFIG_DIRNAME`].
pub const CONFIG_FILENAME: &str = "config.toml";
/// First line printed by `am watch-uids` once the observer is registered.
pub const DEFAULT_READY_PREFIX: &str = "Watching uid states";

/// Timeouts and transport for a uid watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Timeout applied to waits that do not pass their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// How long to wait for the ready banner after launching the command.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Prefix the first output line must start with.
    #[serde(default = "default_ready_prefix")]
    pub ready_prefix: String,
    /// Time the watcher gets to exit after `q` before it is signalled.
    #[serde(default = "default_teardown_grace_ms")]
    pub teardown_grace_ms: u64,
    #[serde(default)]
    pub adb: AdbConfig,
}

/// How the `am` command reaches the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdbConfig {
    /// Route the command through `adb shell`. Disable when running on-device.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_adb_program")]
    pub program: String,
    /// Device serial passed as `-s`; the adb default device when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_ready_prefix() -> String {
    DEFAULT_READY_PREFIX.to_string()
}

fn default_teardown_grace_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_adb_program() -> String {
    "adb".to_string()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            ready_prefix: default_ready_prefix(),
            teardown_grace_ms: default_teardown_grace_ms(),
            adb: AdbConfig::default(),
        }
    }
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_adb_program(),
            serial: None,
        }
    }
}

impl WatchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: WatchConfig = toml::from_str("").unwrap();
        assert_eq!(config, WatchConfig::default());
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
        assert_eq!(config.ready_prefix, "Watching uid states");
        assert!(config.adb.enabled);
        assert_eq!(config.adb.program, "adb");
    }

    #[test]
    fn partial_adb_section_keeps_other_defaults() {
        let config: WatchConfig = toml::from_str(
            r#"
            default_timeout_ms = 750
            [adb]
            serial = "emulator-5554"
            "#,
        )
        .unwrap();
        assert_eq!(config.default_timeout_ms, 750);
        assert_eq!(config.adb.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(config.adb.program, "adb");
        assert_eq!(config.ready_timeout_ms, 10_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<WatchConfig, _> = toml::from_str("default_timeout = 3");
        assert!(result.is_err());
    }

    #[test]
    fn serializes_without_unset_serial() {
        let text = toml::to_string(&WatchConfig::default()).unwrap();
        assert!(!text.contains("serial"));
        let back: WatchConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, WatchConfig::default());
    }
}
