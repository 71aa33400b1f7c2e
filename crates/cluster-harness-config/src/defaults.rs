use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression for harness telemetry.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Program used to reach the container runtime.
pub const DEFAULT_DOCKER_PROGRAM: &str = "docker";

/// Number of readiness probes attempted before giving up.
pub const DEFAULT_READINESS_ATTEMPTS: u32 = 10;

/// Delay between readiness probes, in milliseconds.
pub const DEFAULT_READINESS_INTERVAL_MS: u64 = 1_000;

/// Wall-clock budget for a single command, in seconds.
///
/// Kafka readiness probes wait internally for up to a minute, so the budget
/// leaves room for them.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default delay between readiness probes.
#[must_use]
pub const fn default_readiness_interval() -> Duration {
    Duration::from_millis(DEFAULT_READINESS_INTERVAL_MS)
}

/// Default per-command timeout.
#[must_use]
pub const fn default_command_timeout() -> Duration {
    Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)
}
