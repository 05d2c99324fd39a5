//! CLI command implementations for the `uidwatch` binary.

pub mod config;
pub mod wait;
pub mod watch;

use anyhow::{bail, Context, Result};

use uidwatch_harness::{RunnerOptions, WatchUidRunner};
use uidwatch_shell::ShellCommand;
use uidwatch_types::{ConfigLoader, WatchConfig};

/// Which uid to watch and how to reach the watcher.
#[derive(Debug)]
pub struct Target<'a> {
    pub uid: u32,
    pub mask: u32,
    pub serial: Option<String>,
    /// `--raw` program and arguments, replacing `am watch-uids`.
    pub raw: Option<&'a [String]>,
}

/// Load the layered configuration, applying a `--serial` override.
pub fn load_config(serial: Option<&str>) -> Result<WatchConfig> {
    let mut config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?
        .config;
    if let Some(serial) = serial {
        config.adb.serial = Some(serial.to_string());
    }
    Ok(config)
}

/// Start a watcher for `target`, blocking until it reports ready.
pub fn start_runner(target: &Target<'_>, config: &WatchConfig) -> Result<WatchUidRunner> {
    let mut options = RunnerOptions::from_config(config, target.uid, target.mask);
    if let Some(raw) = target.raw {
        let Some((program, args)) = raw.split_first() else {
            bail!("--raw requires a program");
        };
        options.command = ShellCommand::raw(program.as_str(), args);
    }

    let command = options.command.to_string();
    WatchUidRunner::start(target.uid, options)
        .with_context(|| format!("failed to start watcher: {command}"))
}
