//! End-to-end smoke tests that invoke the `uidwatch` binary.
//!
//! Uses `assert_cmd` with HOME and the working directory pointed at a temp
//! directory so the user's real config is never read. Watchers are fake
//! `/bin/sh` scripts passed through `--raw`.
//!
//! The `uidwatch` binary must be built before running these tests:
//!   cargo build -p uidwatch-cli && cargo test --test test_smoke

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static BUILD_ONCE: Once = Once::new();

const BANNER: &str = "Watching uid states of uid 10123";
const IDLE: &str = "while read l; do [ \"$l\" = q ] && exit 0; done";

/// Ensure the uidwatch binary is built, then return its path.
fn uidwatch_bin() -> PathBuf {
    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests/ should have a parent")
        .to_path_buf();

    BUILD_ONCE.call_once(|| {
        let status = std::process::Command::new("cargo")
            .args(["build", "-p", "uidwatch-cli"])
            .current_dir(&workspace_root)
            .status()
            .expect("failed to invoke cargo build");
        assert!(status.success(), "cargo build -p uidwatch-cli failed");
    });

    let bin = workspace_root.join("target").join("debug").join("uidwatch");
    assert!(bin.exists(), "uidwatch binary not found at {}", bin.display());
    bin
}

/// Get a Command for the `uidwatch` binary isolated under `home`.
fn uidwatch_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(uidwatch_bin());
    cmd.env("HOME", home).current_dir(home);
    for var in [
        "UIDWATCH_DEFAULT_TIMEOUT_MS",
        "UIDWATCH_READY_TIMEOUT_MS",
        "UIDWATCH_TEARDOWN_GRACE_MS",
        "UIDWATCH_ADB_PROGRAM",
        "UIDWATCH_ADB_SERIAL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn fake_script(lines: &[&str]) -> String {
    let mut script = format!("echo '{BANNER}'; ");
    for line in lines {
        script.push_str(&format!("echo '{line}'; "));
    }
    script.push_str(IDLE);
    script
}

#[test]
fn wait_prints_matching_line() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let script = fake_script(&["10123 procstate CEM", "10999 procstate TOP", "10123 procstate TOP"]);

    uidwatch_cmd(tmpdir.path())
        .args(["wait", "--uid", "10123", "--cmd", "procstate", "--state", "TOP"])
        .args(["--raw", "/bin/sh", "-c", &script])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("10123 procstate TOP"));
}

#[test]
fn wait_fails_on_failure_predicate() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let script = fake_script(&["10123 gone"]);

    uidwatch_cmd(tmpdir.path())
        .args(["wait", "--uid", "10123", "--cmd", "procstate", "--state", "TOP"])
        .args(["--fail-cmd", "gone"])
        .args(["--raw", "/bin/sh", "-c", &script])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected line hit"));
}

#[test]
fn wait_times_out() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let script = fake_script(&[]);

    uidwatch_cmd(tmpdir.path())
        .args(["wait", "--uid", "10123", "--cmd", "gone", "--timeout-ms", "200"])
        .args(["--raw", "/bin/sh", "-c", &script])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("timed out waiting for next line"));
}

#[test]
fn watch_streams_lines_for_uid() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let script = fake_script(&["10123 procstate TOP", "10999 active", "10123 active"]);

    uidwatch_cmd(tmpdir.path())
        .args(["watch", "--uid", "10123", "--count", "2"])
        .args(["--raw", "/bin/sh", "-c", &script])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("10123 procstate TOP")
                .and(predicate::str::contains("10123 active"))
                .and(predicate::str::contains("10999").not()),
        );
}

#[test]
fn watch_ends_with_stream() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let script = format!("echo '{BANNER}'; echo '10123 idle'");

    uidwatch_cmd(tmpdir.path())
        .args(["watch", "--uid", "10123"])
        .args(["--raw", "/bin/sh", "-c", &script])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("10123 idle"));
}

#[test]
fn config_reports_workspace_file() {
    let tmpdir = tempfile::tempdir().expect("temp dir");
    let home = tmpdir.path();
    fs::create_dir_all(home.join(".uidwatch")).unwrap();
    fs::write(
        home.join(".uidwatch").join("config.toml"),
        "default_timeout_ms = 1234\n",
    )
    .unwrap();

    uidwatch_cmd(home)
        .args(["config"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("default_timeout_ms")
                .and(predicate::str::contains("1234"))
                .and(predicate::str::contains("ready_timeout_ms")),
        );
}

#[test]
fn config_env_override_is_attributed() {
    let tmpdir = tempfile::tempdir().expect("temp dir");

    uidwatch_cmd(tmpdir.path())
        .env("UIDWATCH_READY_TIMEOUT_MS", "4321")
        .args(["config"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("4321")
                .and(predicate::str::contains("env var: UIDWATCH_READY_TIMEOUT_MS")),
        );
}
