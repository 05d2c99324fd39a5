//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::time::Duration;

use uidwatch_harness::{RunnerOptions, WatchUidRunner};
use uidwatch_shell::ShellCommand;

/// Uid used by the fake watchers.
pub const UID: u32 = 10123;

/// Banner the fake watchers print before any data.
pub const BANNER: &str = "Watching uid states of uid 10123";

/// Shell loop that idles until `q` arrives or stdin closes.
pub const IDLE_UNTIL_QUIT: &str = "while read l; do [ \"$l\" = q ] && exit 0; done";

/// Runner options that launch `/bin/sh -c script` with short timeouts.
pub fn sh_options(script: &str) -> RunnerOptions {
    RunnerOptions::with_command(ShellCommand::raw(
        "/bin/sh",
        &["-c".to_string(), script.to_string()],
    ))
    .default_timeout(Duration::from_secs(5))
    .ready_timeout(Duration::from_secs(5))
    .teardown_grace(Duration::from_millis(500))
}

/// Script printing the banner, then each of `lines`, then idling.
pub fn watcher_script(lines: &[&str]) -> String {
    let mut script = format!("echo '{BANNER}'; ");
    for line in lines {
        script.push_str(&format!("echo '{line}'; "));
    }
    script.push_str(IDLE_UNTIL_QUIT);
    script
}

/// Start a fake watcher for [`UID`] that reports `lines` and then idles.
pub fn start_fake(lines: &[&str]) -> WatchUidRunner {
    WatchUidRunner::start(UID, sh_options(&watcher_script(lines)))
        .expect("fake watcher should start")
}

/// Start a fake watcher running `body` after the banner.
pub fn start_script(body: &str) -> WatchUidRunner {
    let script = format!("echo '{BANNER}'; {body}");
    WatchUidRunner::start(UID, sh_options(&script)).expect("fake watcher should start")
}

/// Whether a process with `pid` still exists.
pub fn process_exists(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}
