//! `uidwatch watch` -- stream a uid's state changes to stdout.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use uidwatch_harness::PopResult;

use super::{load_config, start_runner, Target};

/// How long a single queue poll blocks before checking the exit conditions.
const POLL_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug)]
pub struct WatchArgs<'a> {
    pub target: Target<'a>,
    pub count: Option<usize>,
    pub duration_ms: Option<u64>,
}

/// Run `uidwatch watch`.
pub fn run(args: &WatchArgs<'_>) -> Result<()> {
    let config = load_config(args.target.serial.as_deref())?;
    let runner = start_runner(&args.target, &config)?;
    let queue = runner.waiter().queue();
    let stop_at = args
        .duration_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let stdout = std::io::stdout();
    let mut printed = 0usize;

    loop {
        if args.count.is_some_and(|n| printed >= n) {
            break;
        }
        let now = Instant::now();
        if stop_at.is_some_and(|t| now >= t) {
            break;
        }
        let deadline = match stop_at {
            Some(t) => t.min(now + POLL_SLICE),
            None => now + POLL_SLICE,
        };

        match queue.pop_until(deadline) {
            PopResult::Line(line) => {
                let mut out = stdout.lock();
                writeln!(out, "{}", line.tokens().join(" "))
                    .context("failed to write to stdout")?;
                out.flush().context("failed to flush stdout")?;
                if !line.is_comment() {
                    printed += 1;
                }
            }
            PopResult::TimedOut => {}
            PopResult::Closed(reason) => {
                info!(uid = runner.uid(), %reason, "watcher stream closed");
                break;
            }
            PopResult::Stopped => break,
        }
    }

    runner.finish().context("failed to stop watcher")?;
    Ok(())
}
