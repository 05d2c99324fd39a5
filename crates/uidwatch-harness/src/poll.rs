//! Polling checks for state that has no event stream.
//!
//! Some device state can only be sampled (`dumpsys` output, settings).
//! [`PollingCheck`] re-evaluates a condition at a fixed interval until it
//! holds or the timeout expires.

use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::HarnessError;

/// Default interval between evaluations.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Condition poller with a timeout and interval.
#[derive(Debug, Clone)]
pub struct PollingCheck {
    timeout: Duration,
    interval: Duration,
}

impl Default for PollingCheck {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl PollingCheck {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Evaluate `condition` until it returns true.
    ///
    /// The condition is always evaluated at least once, and once more at
    /// the deadline, so a zero timeout still checks the current state.
    pub fn wait_until<F>(&self, description: &str, mut condition: F) -> Result<(), HarnessError>
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if condition() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(description, "polling check timed out");
                return Err(HarnessError::PollTimeout {
                    description: description.to_string(),
                });
            }
            thread::sleep(self.interval.min(deadline - now));
        }
    }

    /// Evaluate a fallible probe until it returns `Ok`, returning its value.
    ///
    /// The last probe error is included in the timeout message.
    pub fn wait_until_ok<T, E, F>(&self, description: &str, mut probe: F) -> Result<T, HarnessError>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            let last_error = match probe() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let now = Instant::now();
            if now >= deadline {
                debug!(description, error = %last_error, "polling check timed out");
                return Err(HarnessError::PollTimeout {
                    description: format!("{description} (last error: {last_error})"),
                });
            }
            thread::sleep(self.interval.min(deadline - now));
        }
    }
}

/// [`PollingCheck::wait_until`] with an explicit timeout and interval.
pub fn wait_until<F>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    condition: F,
) -> Result<(), HarnessError>
where
    F: FnMut() -> bool,
{
    PollingCheck::new(timeout)
        .interval(interval)
        .wait_until(description, condition)
}

/// [`PollingCheck::wait_until_ok`] with an explicit timeout and interval.
pub fn wait_until_ok<T, E, F>(
    description: &str,
    timeout: Duration,
    interval: Duration,
    probe: F,
) -> Result<T, HarnessError>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    PollingCheck::new(timeout)
        .interval(interval)
        .wait_until_ok(description, probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_after_a_few_polls() {
        let mut calls = 0;
        wait_until("counter reaches 3", Duration::from_secs(5), Duration::from_millis(1), || {
            calls += 1;
            calls >= 3
        })
        .unwrap();
        assert_eq!(calls, 3);
    }

    #[test]
    fn times_out_with_description() {
        let started = Instant::now();
        let err = wait_until(
            "procstate is not TOP",
            Duration::from_millis(100),
            Duration::from_millis(10),
            || false,
        )
        .unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("procstate is not TOP"));
    }

    #[test]
    fn zero_timeout_still_checks_once() {
        PollingCheck::new(Duration::ZERO)
            .wait_until("already true", || true)
            .unwrap();
    }

    #[test]
    fn wait_until_ok_returns_value() {
        let mut attempts = 0;
        let value = wait_until_ok(
            "setting applied",
            Duration::from_secs(5),
            Duration::from_millis(1),
            || {
                attempts += 1;
                if attempts < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            },
        )
        .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn wait_until_ok_reports_last_error() {
        let err = PollingCheck::new(Duration::from_millis(30))
            .interval(Duration::from_millis(5))
            .wait_until_ok("config visible", || Err::<(), _>("key missing"))
            .unwrap_err();
        assert!(err.to_string().contains("last error: key missing"));
    }
}
