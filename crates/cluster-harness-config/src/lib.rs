//! Shared configuration for the container cluster harness.
//!
//! [`HarnessConfig`] is layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or `HARNESS_CONFIG_PATH`), then
//! `HARNESS_*` environment variables, then command-line flags. Scenario tests
//! normally call [`HarnessConfig::load_from_env`] once and hand the result to
//! the harness.
//!
//! Every field is optional so partially specified layers merge cleanly; the
//! accessors fall back to the values in [`defaults`].

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_DOCKER_PROGRAM, DEFAULT_LOG_FILTER,
    DEFAULT_READINESS_ATTEMPTS, DEFAULT_READINESS_INTERVAL_MS, default_command_timeout,
    default_log_filter, default_log_format, default_readiness_interval,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Harness configuration merged from defaults, files, environment and CLI.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "HARNESS")]
pub struct HarnessConfig {
    /// Tracing filter expression, for example `cluster_harness=debug`.
    pub log_filter: Option<String>,
    /// Output format for harness telemetry.
    pub log_format: Option<LogFormat>,
    /// Program used to drive the container runtime.
    pub docker_program: Option<String>,
    /// Readiness probes attempted before a service is declared unhealthy.
    pub readiness_attempts: Option<u32>,
    /// Delay between readiness probes, in milliseconds.
    pub readiness_interval_ms: Option<u64>,
    /// Wall-clock budget for one command, in seconds.
    pub command_timeout_secs: Option<u64>,
}

impl HarnessConfig {
    /// Loads configuration using only the program name as CLI input.
    ///
    /// Test binaries receive libtest flags on their command line, so the
    /// harness never forwards real process arguments to the loader.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when a configuration file
    /// or environment variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([OsString::from("cluster-harness")])
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Program used to reach the container runtime.
    #[must_use]
    pub fn docker_program(&self) -> &str {
        self.docker_program
            .as_deref()
            .unwrap_or(DEFAULT_DOCKER_PROGRAM)
    }

    /// Readiness attempt budget. A configured value of zero is raised to one.
    #[must_use]
    pub fn readiness_attempts(&self) -> u32 {
        self.readiness_attempts
            .unwrap_or(DEFAULT_READINESS_ATTEMPTS)
            .max(1)
    }

    /// Delay between readiness probes.
    #[must_use]
    pub fn readiness_interval(&self) -> Duration {
        self.readiness_interval_ms
            .map_or_else(default_readiness_interval, Duration::from_millis)
    }

    /// Per-command timeout. A configured value of zero is raised to one
    /// second.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout_secs
            .map_or_else(default_command_timeout, |secs| {
                Duration::from_secs(secs.max(1))
            })
    }

    /// Overrides the container runtime program.
    #[must_use]
    pub fn with_docker_program(mut self, program: impl Into<String>) -> Self {
        self.docker_program = Some(program.into());
        self
    }

    /// Overrides the readiness budget.
    #[must_use]
    pub fn with_readiness(mut self, attempts: u32, interval: Duration) -> Self {
        self.readiness_attempts = Some(attempts);
        self.readiness_interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Overrides the per-command timeout.
    ///
    /// The budget is stored in whole seconds; fractions round up, so
    /// `250ms` becomes one second rather than zero.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout
            .as_secs()
            .saturating_add(u64::from(timeout.subsec_nanos() > 0));
        self.command_timeout_secs = Some(secs.max(1));
        self
    }
}
