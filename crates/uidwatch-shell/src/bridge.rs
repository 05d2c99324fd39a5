//! Running watcher process and its pipes.
//!
//! The child is spawned in its own process group so teardown can signal
//! everything it started (`adb` forks helpers, test scripts fork `sleep`).
//! Stdout is handed off as a [`LineSource`] to whichever thread parses it;
//! stdin stays with the bridge for control commands such as `q`.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdin, ChildStdout, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use uidwatch_types::UidWatchError;

use crate::command::ShellCommand;

/// Interval used when polling the child for exit during teardown.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Time between SIGTERM and SIGKILL once the grace period has expired.
const TERM_TO_KILL: Duration = Duration::from_millis(250);

/// Buffered line reader over the child's stdout.
pub struct LineSource {
    reader: BufReader<ChildStdout>,
    buf: Vec<u8>,
}

impl LineSource {
    fn new(stdout: ChildStdout) -> Self {
        Self {
            reader: BufReader::new(stdout),
            buf: Vec::with_capacity(256),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` at end of stream. Invalid UTF-8 is replaced rather
    /// than rejected, since the line will only be tokenized and logged.
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// A launched watcher command.
pub struct ShellBridge {
    command: ShellCommand,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<LineSource>,
    exit_status: Option<ExitStatus>,
    shut_down: bool,
}

impl ShellBridge {
    /// Spawn `command` with piped stdin/stdout in a new process group.
    pub fn spawn(command: &ShellCommand) -> Result<Self, UidWatchError> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| UidWatchError::ShellError(format!("failed to spawn `{command}`: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            UidWatchError::ShellError(format!("stdout of `{command}` not captured"))
        })?;
        let stdin = child.stdin.take();

        info!(pid = child.id(), command = %command, "spawned watcher command");

        Ok(Self {
            command: command.clone(),
            child,
            stdin,
            stdout: Some(LineSource::new(stdout)),
            exit_status: None,
            shut_down: false,
        })
    }

    pub fn command(&self) -> &ShellCommand {
        &self.command
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Block until the first output line arrives and check it starts with
    /// `prefix`.
    ///
    /// Returns the ready line. Fails on a different first line, on end of
    /// stream, or when nothing arrives within `timeout`. After a timeout the
    /// helper thread stays blocked until [`shutdown`](Self::shutdown) kills
    /// the process group and its read returns.
    pub fn await_ready(&mut self, prefix: &str, timeout: Duration) -> Result<String, UidWatchError> {
        let mut source = self.stdout.take().ok_or_else(|| {
            UidWatchError::ShellError("stdout was already handed to a reader".into())
        })?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("watch-ready".into())
            .spawn(move || {
                let result = source.read_line();
                let _ = tx.send((source, result));
            })
            .map_err(|e| UidWatchError::ShellError(format!("failed to spawn ready reader: {e}")))?;

        match rx.recv_timeout(timeout) {
            Ok((source, Ok(Some(line)))) => {
                self.stdout = Some(source);
                if line.starts_with(prefix) {
                    debug!(line = %line, "watcher ready");
                    Ok(line)
                } else {
                    Err(UidWatchError::ShellError(format!(
                        "unexpected output from `{}`: {line:?} (expected a line starting with {prefix:?})",
                        self.command
                    )))
                }
            }
            Ok((_, Ok(None))) => Err(UidWatchError::ShellError(format!(
                "`{}` closed its output before printing {prefix:?}",
                self.command
            ))),
            Ok((_, Err(e))) => Err(UidWatchError::ShellError(format!(
                "failed reading first line of `{}`: {e}",
                self.command
            ))),
            Err(RecvTimeoutError::Timeout) => Err(UidWatchError::ShellError(format!(
                "timed out after {timeout:?} waiting for {prefix:?} from `{}`",
                self.command
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(UidWatchError::ShellError(
                "ready reader exited without reporting".into(),
            )),
        }
    }

    /// Hand the stdout line source to the caller (normally a reader thread).
    pub fn take_reader(&mut self) -> Option<LineSource> {
        self.stdout.take()
    }

    /// Send one control line to the child's stdin.
    pub fn write_line(&mut self, line: &str) -> Result<(), UidWatchError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| UidWatchError::ShellError("stdin is already closed".into()))?;
        writeln!(stdin, "{line}")
            .and_then(|()| stdin.flush())
            .map_err(|e| UidWatchError::ShellError(format!("write to `{}`: {e}", self.command)))
    }

    /// Check whether the child has exited, without blocking.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(_) => false,
        }
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Stop the watcher and release its descriptors.
    ///
    /// Sends `q`, closes stdin, and gives the child `grace` to exit on its
    /// own. Survivors are sent SIGTERM and then SIGKILL. The whole process
    /// group is killed at the end so no descendant keeps the stdout pipe
    /// open. Calling this more than once is a no-op.
    pub fn shutdown(&mut self, grace: Duration) -> Result<(), UidWatchError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        if let Some(mut stdin) = self.stdin.take() {
            // The child may already be gone; a broken pipe here is expected.
            let _ = writeln!(stdin, "q").and_then(|()| stdin.flush());
        }
        self.stdout = None;

        let pgid = Pid::from_raw(self.child.id() as i32);
        if !self.wait_for_exit(grace)? {
            warn!(pid = self.child.id(), "watcher ignored quit, sending SIGTERM");
            signal_group(pgid, Signal::SIGTERM);
            if !self.wait_for_exit(TERM_TO_KILL)? {
                warn!(pid = self.child.id(), "watcher survived SIGTERM, sending SIGKILL");
                signal_group(pgid, Signal::SIGKILL);
                let status = self.child.wait().map_err(|e| {
                    UidWatchError::ShellError(format!("failed to reap `{}`: {e}", self.command))
                })?;
                self.exit_status = Some(status);
            }
        }
        signal_group(pgid, Signal::SIGKILL);

        debug!(command = %self.command, status = ?self.exit_status, "watcher shut down");
        Ok(())
    }

    /// Poll for exit until `limit` elapses. Returns whether the child exited.
    fn wait_for_exit(&mut self, limit: Duration) -> Result<bool, UidWatchError> {
        if self.exit_status.is_some() {
            return Ok(true);
        }
        let deadline = Instant::now() + limit;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    self.exit_status = Some(status);
                    return Ok(true);
                }
                Ok(None) if Instant::now() >= deadline => return Ok(false),
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    return Err(UidWatchError::ShellError(format!(
                        "failed to poll `{}`: {e}",
                        self.command
                    )))
                }
            }
        }
    }
}

impl Drop for ShellBridge {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(Duration::from_millis(500)) {
            warn!(error = %e, "watcher teardown failed during drop");
        }
    }
}

/// Signal a whole process group. A group that no longer exists is fine.
fn signal_group(pgid: Pid, sig: Signal) {
    match killpg(pgid, sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = pgid.as_raw(), signal = ?sig, error = %e, "killpg failed"),
    }
}
