//! Tracing output for harness runs.
//!
//! Scenario binaries share one process-wide subscriber. The first scenario to
//! call [`initialise`] installs it from its [`HarnessConfig`]; later calls are
//! no-ops, so every test can initialise unconditionally. Events go to stderr,
//! where libtest captures them per test and replays them on failure.

use std::io::{self, IsTerminal};

use cluster_harness_config::{HarnessConfig, LogFormat};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static INSTALLED: OnceCell<()> = OnceCell::new();

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Proof that harness events are being recorded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Reasons the harness subscriber could not be installed.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid `EnvFilter` directive list.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Something other than the harness installed a global subscriber first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Routes harness events to stderr using the configured filter and format.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter expression and
/// [`TelemetryError::Subscriber`] when another subscriber was installed
/// outside this module.
pub fn initialise(config: &HarnessConfig) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            let subscriber = build_subscriber(config)?;
            tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
        })
        .map(|_| TelemetryHandle)
}

fn build_subscriber(config: &HarnessConfig) -> Result<BoxedSubscriber, TelemetryError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(build_filter(config.log_filter())?)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

fn build_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))
}
