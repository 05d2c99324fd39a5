//! `uidwatch wait` -- block until a uid reports a matching line.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use uidwatch_harness::WatchUidPredicate;
use uidwatch_types::WatchCommand;

use super::{load_config, start_runner, Target};

#[derive(Debug)]
pub struct WaitArgs<'a> {
    pub target: Target<'a>,
    pub cmd: WatchCommand,
    pub state: Option<String>,
    pub capability: Option<u32>,
    pub fail_cmd: Option<WatchCommand>,
    pub fail_state: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Run `uidwatch wait`. Prints the matching line on success.
pub fn run(args: &WaitArgs<'_>) -> Result<()> {
    let config = load_config(args.target.serial.as_deref())?;

    let expected = WatchUidPredicate::builder(args.cmd)
        .maybe_procstate(args.state.as_deref())
        .maybe_capability(args.capability)
        .build();
    let failure = args.fail_cmd.map(|cmd| {
        WatchUidPredicate::builder(cmd)
            .maybe_procstate(args.fail_state.as_deref())
            .build()
    });
    let timeout = args
        .timeout_ms
        .map_or_else(|| config.default_timeout(), Duration::from_millis);

    let runner = start_runner(&args.target, &config)?;
    info!(uid = runner.uid(), %expected, ?timeout, "waiting");

    let outcome = runner.wait_for_match(&expected, failure.as_ref(), timeout);
    let finished = runner.finish();

    let line = outcome.with_context(|| format!("wait for uid {} failed", args.target.uid))?;
    println!("{}", line.tokens().join(" "));
    finished.context("failed to stop watcher")?;
    Ok(())
}
