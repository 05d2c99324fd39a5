//! Watcher session: the shell bridge, its reader thread, and the waiter.
//!
//! [`WatchUidRunner::start`] launches the watch command, blocks until it
//! prints its ready banner, then hands stdout to a dedicated reader thread.
//! The reader tokenizes each line, drops short lines and lines about other
//! uids, and queues the rest for the calling thread. Exactly two threads
//! touch a session: the reader and whoever waits.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use uidwatch_shell::{LineSource, ShellBridge, ShellCommand};
use uidwatch_types::{WatchCommand, WatchConfig, DEFAULT_READY_PREFIX};

use crate::error::HarnessError;
use crate::line::{Classified, RawLine};
use crate::predicate::WatchUidPredicate;
use crate::queue::{CloseReason, PendingQueue};
use crate::waiter::UidWaiter;

/// Extra time the reader gets to exit after the bridge is shut down.
const READER_JOIN_SLACK: Duration = Duration::from_secs(1);

/// How to launch and time a watcher.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub command: ShellCommand,
    /// Timeout for waits that do not pass their own.
    pub default_timeout: Duration,
    pub ready_prefix: String,
    pub ready_timeout: Duration,
    pub teardown_grace: Duration,
}

impl RunnerOptions {
    /// Built-in defaults for watching `uid` over adb.
    pub fn for_uid(uid: u32) -> Self {
        Self::from_config(&WatchConfig::default(), uid, 0)
    }

    pub fn from_config(config: &WatchConfig, uid: u32, capability_mask: u32) -> Self {
        Self {
            command: ShellCommand::from_config(config, uid, capability_mask),
            default_timeout: config.default_timeout(),
            ready_prefix: config.ready_prefix.clone(),
            ready_timeout: config.ready_timeout(),
            teardown_grace: config.teardown_grace(),
        }
    }

    /// Built-in timeouts around an arbitrary line-protocol command.
    pub fn with_command(command: ShellCommand) -> Self {
        let config = WatchConfig::default();
        Self {
            command,
            default_timeout: config.default_timeout(),
            ready_prefix: DEFAULT_READY_PREFIX.to_string(),
            ready_timeout: config.ready_timeout(),
            teardown_grace: config.teardown_grace(),
        }
    }

    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    #[must_use]
    pub fn ready_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ready_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }
}

/// A running `am watch-uids` session for one uid.
///
/// All operations take `&self`, so [`finish`](Self::finish) may be called
/// from another thread while a wait is blocked; that wait then returns
/// [`HarnessError::Finished`]. Dropping the runner finishes it.
pub struct WatchUidRunner {
    waiter: UidWaiter,
    default_timeout: Duration,
    teardown_grace: Duration,
    bridge: Mutex<ShellBridge>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WatchUidRunner {
    /// Launch the watcher and start the reader thread.
    ///
    /// Fails with [`HarnessError::NotReady`] when the first output line does
    /// not start with the configured ready prefix; the process is torn down
    /// before returning.
    pub fn start(uid: u32, options: RunnerOptions) -> Result<Self, HarnessError> {
        let mut bridge = ShellBridge::spawn(&options.command)?;

        // The watcher registers its observer asynchronously; nothing may be
        // asserted until it says so.
        if let Err(e) = bridge.await_ready(&options.ready_prefix, options.ready_timeout) {
            if let Err(teardown) = bridge.shutdown(options.teardown_grace) {
                warn!(uid, error = %teardown, "teardown after failed start also failed");
            }
            return Err(HarnessError::NotReady(e));
        }

        let source = bridge
            .take_reader()
            .ok_or_else(|| HarnessError::Other("watcher stdout unavailable".into()))?;
        let queue = Arc::new(PendingQueue::new());

        let reader = {
            let queue = Arc::clone(&queue);
            let subject = uid.to_string();
            thread::Builder::new()
                .name(format!("watch-uid-{uid}"))
                .spawn(move || reader_loop(source, &subject, &queue))
                .map_err(|e| HarnessError::Other(format!("failed to spawn reader thread: {e}")))?
        };

        info!(uid, command = %options.command, "watching uid");

        Ok(Self {
            waiter: UidWaiter::new(uid, queue),
            default_timeout: options.default_timeout,
            teardown_grace: options.teardown_grace,
            bridge: Mutex::new(bridge),
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn uid(&self) -> u32 {
        self.waiter.uid()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn waiter(&self) -> &UidWaiter {
        &self.waiter
    }

    /// Number of lines received but not yet consumed.
    pub fn pending(&self) -> usize {
        self.waiter.queue().len()
    }

    /// Strict next-line expectation with the default timeout.
    pub fn expect(
        &self,
        command: WatchCommand,
        procstate: Option<&str>,
    ) -> Result<RawLine, HarnessError> {
        self.waiter.expect(command, procstate, self.default_timeout)
    }

    pub fn expect_with_timeout(
        &self,
        command: WatchCommand,
        procstate: Option<&str>,
        timeout: Duration,
    ) -> Result<RawLine, HarnessError> {
        self.waiter.expect(command, procstate, timeout)
    }

    /// Wait for any line of `command`.
    pub fn wait_for(&self, command: WatchCommand) -> Result<RawLine, HarnessError> {
        self.wait_for_match(&WatchUidPredicate::new(command), None, self.default_timeout)
    }

    pub fn wait_for_with_timeout(
        &self,
        command: WatchCommand,
        procstate: Option<&str>,
        timeout: Duration,
    ) -> Result<RawLine, HarnessError> {
        let expected = WatchUidPredicate::builder(command)
            .maybe_procstate(procstate)
            .build();
        self.wait_for_match(&expected, None, timeout)
    }

    /// Wait for a `command` line reporting `procstate`.
    pub fn wait_for_state(
        &self,
        command: WatchCommand,
        procstate: &str,
    ) -> Result<RawLine, HarnessError> {
        let expected = WatchUidPredicate::builder(command).procstate(procstate).build();
        self.wait_for_match(&expected, None, self.default_timeout)
    }

    /// See [`UidWaiter::wait_for_match`].
    pub fn wait_for_match(
        &self,
        expected: &WatchUidPredicate,
        failure: Option<&WatchUidPredicate>,
        timeout: Duration,
    ) -> Result<RawLine, HarnessError> {
        self.waiter.wait_for_match(expected, failure, timeout)
    }

    pub fn clear_history(&self) {
        self.waiter.clear_history();
    }

    /// Send a control line to the watcher's stdin.
    pub fn send_command(&self, line: &str) -> Result<(), HarnessError> {
        self.bridge.lock().write_line(line)?;
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.waiter.queue().is_stopping()
    }

    /// Process id of the watcher command.
    pub fn pid(&self) -> u32 {
        self.bridge.lock().pid()
    }

    /// Whether the watcher process is still running.
    pub fn is_alive(&self) -> bool {
        self.bridge.lock().is_alive()
    }

    /// Stop the session: release waiters, quit the watcher, join the reader.
    ///
    /// Safe to call more than once and from any thread.
    pub fn finish(&self) -> Result<(), HarnessError> {
        self.waiter.queue().stop();
        let shutdown = self.bridge.lock().shutdown(self.teardown_grace);

        if let Some(handle) = self.reader.lock().take() {
            join_with_deadline(handle, Instant::now() + self.teardown_grace + READER_JOIN_SLACK);
        }

        debug!(uid = self.uid(), "watcher finished");
        shutdown.map_err(HarnessError::from)
    }
}

impl Drop for WatchUidRunner {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(uid = self.uid(), error = %e, "failed to finish watcher on drop");
        }
    }
}

/// Body of the reader thread.
///
/// Comments and data lines for `subject` are queued; short lines and lines
/// about other uids are logged and dropped. Ends at end of stream, on a read
/// error, or once the queue refuses a line because the session is stopping.
fn reader_loop(mut source: LineSource, subject: &str, queue: &PendingQueue) {
    loop {
        let text = match source.read_line() {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(uid = subject, "watcher output ended");
                queue.close(CloseReason::Eof);
                return;
            }
            Err(e) => {
                warn!(uid = subject, error = %e, "failed reading watcher output");
                queue.close(CloseReason::Io(e.to_string()));
                return;
            }
        };

        let line = RawLine::parse(&text);
        match line.classify(subject) {
            Classified::TooShort => {
                debug!(uid = subject, line = %text, "skipping too short");
                continue;
            }
            Classified::OtherUid => {
                debug!(uid = subject, line = %text, "skipping ignored uid");
                continue;
            }
            Classified::Comment | Classified::Data => {}
        }

        if !queue.push(line) {
            return;
        }
    }
}

/// Join `handle`, giving up (and leaving the thread detached) at `deadline`.
fn join_with_deadline(handle: JoinHandle<()>, deadline: Instant) {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                thread = handle.thread().name().unwrap_or("reader"),
                "reader thread did not exit; detaching"
            );
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        warn!("reader thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uidwatch_types::procstate;

    fn sh(script: &str) -> RunnerOptions {
        RunnerOptions::with_command(ShellCommand::raw(
            "/bin/sh",
            &["-c".to_string(), script.to_string()],
        ))
        .teardown_grace(Duration::from_millis(500))
    }

    /// Prints the banner and `body`, then idles until `q` or stdin EOF.
    fn fake_watcher(body: &str) -> RunnerOptions {
        sh(&format!(
            "echo 'Watching uid states of uid 10123'; {body} \
             while read l; do [ \"$l\" = q ] && exit 0; done"
        ))
    }

    #[test]
    fn waits_for_reported_state() {
        let runner = WatchUidRunner::start(
            10123,
            fake_watcher("echo '10123 procstate CEM'; echo '10123 procstate TOP';"),
        )
        .unwrap();
        runner
            .wait_for_state(WatchCommand::Procstate, procstate::TOP)
            .unwrap();
        runner.finish().unwrap();
        assert!(runner.is_finished());
    }

    #[test]
    fn other_uids_and_short_lines_are_dropped() {
        let runner = WatchUidRunner::start(
            10123,
            fake_watcher("echo '10999 gone'; echo '10123'; echo '# note'; echo '10123 idle';"),
        )
        .unwrap();
        let gone = WatchUidPredicate::new(WatchCommand::Gone);
        runner
            .wait_for_match(
                &WatchUidPredicate::new(WatchCommand::Idle),
                Some(&gone),
                Duration::from_secs(5),
            )
            .unwrap();
        runner.finish().unwrap();
    }

    #[test]
    fn not_ready_when_banner_missing() {
        let err = WatchUidRunner::start(10123, sh("echo 'Error: unknown command'"))
            .err()
            .expect("start should fail");
        match err {
            HarnessError::NotReady(inner) => {
                assert!(inner.to_string().contains("Error: unknown command"));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    fn stream_end_surfaces_as_closed() {
        let runner =
            WatchUidRunner::start(10123, sh("echo 'Watching uid states'; echo '10123 active'"))
                .unwrap();
        runner.wait_for(WatchCommand::Active).unwrap();
        let err = runner
            .wait_for_match(
                &WatchUidPredicate::new(WatchCommand::Idle),
                None,
                Duration::from_secs(5),
            )
            .unwrap_err();
        assert!(matches!(err, HarnessError::StreamClosed { uid: 10123, .. }), "{err:?}");
    }

    #[test]
    fn finish_is_idempotent() {
        let runner = WatchUidRunner::start(10123, fake_watcher("")).unwrap();
        runner.finish().unwrap();
        runner.finish().unwrap();
        assert!(runner.send_command("q").is_err());
    }

    #[test]
    fn options_from_config() {
        let mut config = WatchConfig::default();
        config.default_timeout_ms = 1234;
        config.adb.enabled = false;
        let options = RunnerOptions::from_config(&config, 10123, 8);
        assert_eq!(options.default_timeout, Duration::from_millis(1234));
        assert_eq!(options.command.to_string(), "am watch-uids --oom 10123 --mask 8");
        assert_eq!(options.ready_prefix, "Watching uid states");
    }
}
