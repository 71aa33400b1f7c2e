//! Readiness polling.
//!
//! Container start-up and service readiness are separate events: compose
//! returns as soon as processes are launched, while a broker may need many
//! seconds before it accepts clients. Health-check tooling only offers
//! synchronous point-in-time probes, so readiness is a bounded retry loop.
//!
//! Each cycle moves `Pending → probe → {Success, Retry → Pending, Exhausted}`.
//! `Success` and `Exhausted` are terminal. A probe succeeds when its output
//! contains a line consisting of [`SUCCESS_TOKEN`].

use std::thread;
use std::time::Duration;

use cluster_harness_config::HarnessConfig;
use tracing::{debug, info, warn};

use crate::error::HarnessError;

/// Tracing target for readiness polling.
const READINESS_TARGET: &str = "cluster_harness::readiness";

/// Line printed by a probe that found the service ready.
pub const SUCCESS_TOKEN: &str = "PASS";

/// Line printed by a probe that found the service not ready.
pub const FAILURE_TOKEN: &str = "FAIL";

/// Result of a readiness poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// A probe reported success.
    Ready {
        /// Probes executed, including the successful one.
        attempts: u32,
    },
    /// The attempt budget ran out.
    Exhausted {
        /// Probes executed.
        attempts: u32,
        /// Output or transient error text from the final probe.
        last_output: String,
    },
}

impl ReadinessOutcome {
    /// Whether the service became ready.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Probes executed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Repeats a probe until it reports success or the budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPoller {
    max_attempts: u32,
    interval: Duration,
}

impl ReadinessPoller {
    /// Builds a poller; a budget of zero attempts is raised to one.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Builds a poller from the configured budget.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.readiness_attempts(), config.readiness_interval())
    }

    /// Attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs `probe` until it prints [`SUCCESS_TOKEN`] or the budget is spent.
    ///
    /// Transient probe errors (see [`HarnessError::is_transient`]) count as
    /// failed attempts.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error raised by `probe`.
    pub fn poll<F>(&self, mut probe: F) -> Result<ReadinessOutcome, HarnessError>
    where
        F: FnMut() -> Result<String, HarnessError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let last_output = match probe() {
                Ok(output) if reports_success(&output) => {
                    debug!(target: READINESS_TARGET, attempt, "probe passed");
                    return Ok(ReadinessOutcome::Ready { attempts: attempt });
                }
                Ok(output) => output,
                Err(error) if error.is_transient() => {
                    debug!(target: READINESS_TARGET, attempt, %error, "probe failed transiently");
                    error.to_string()
                }
                Err(error) => return Err(error),
            };

            if attempt >= self.max_attempts {
                return Ok(ReadinessOutcome::Exhausted {
                    attempts: attempt,
                    last_output,
                });
            }
            debug!(
                target: READINESS_TARGET,
                attempt,
                max_attempts = self.max_attempts,
                "probe not ready, retrying"
            );
            thread::sleep(self.interval);
        }
    }

    /// Polls `target` and turns exhaustion into an error.
    ///
    /// Returns the number of probes it took to reach readiness.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ReadinessTimeout`] when the budget is spent,
    /// or the first non-transient probe error.
    pub fn require<F>(&self, target: &str, probe: F) -> Result<u32, HarnessError>
    where
        F: FnMut() -> Result<String, HarnessError>,
    {
        match self.poll(probe)? {
            ReadinessOutcome::Ready { attempts } => {
                info!(target: READINESS_TARGET, service = target, attempts, "service ready");
                Ok(attempts)
            }
            ReadinessOutcome::Exhausted {
                attempts,
                last_output,
            } => {
                warn!(target: READINESS_TARGET, service = target, attempts, "service never became ready");
                Err(HarnessError::ReadinessTimeout {
                    target: target.to_owned(),
                    attempts,
                    last_output: last_output.trim().to_owned(),
                })
            }
        }
    }
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::from_config(&HarnessConfig::default())
    }
}

/// Whether probe output contains a line equal to [`SUCCESS_TOKEN`].
#[must_use]
pub fn reports_success(output: &str) -> bool {
    output.lines().any(|line| line.trim() == SUCCESS_TOKEN)
}
