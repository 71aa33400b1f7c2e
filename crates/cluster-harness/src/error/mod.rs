//! Domain errors raised by the harness.
//!
//! Every failure surfaces to the scenario that triggered it. I/O errors are
//! wrapped in `Arc` to satisfy the `result_large_err` Clippy lint and keep
//! the enum `Send + Sync`.

use std::borrow::Borrow;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors arising while driving containers and their service groups.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The program could not be launched at all.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The command exceeded its wall-clock budget and was killed.
    #[error("command '{command}' timed out after {timeout:?}")]
    CommandTimeout {
        /// Rendered command line.
        command: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },

    /// Waiting on a child process failed.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A host command exited unsuccessfully.
    #[error("host command '{command}' exited with {}: {stderr}", describe_status(.status))]
    HostExecution {
        /// Rendered command line.
        command: String,
        /// Exit code, absent when the process was killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// A command executed in a container exited unsuccessfully.
    #[error("command '{command}' in {target} exited with {}: {stderr}", describe_status(.status))]
    ContainerExecution {
        /// Service or image the command ran in.
        target: String,
        /// Rendered command line.
        command: String,
        /// Exit code, absent when the process was killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Bringing the service group up failed.
    #[error("service group '{group}' failed to start: {message}")]
    GroupStart {
        /// Group name.
        group: String,
        /// Orchestrator diagnostics.
        message: String,
    },

    /// The group has already been started once.
    #[error("service group '{group}' has already been started")]
    AlreadyStarted {
        /// Group name.
        group: String,
    },

    /// A command was issued before the group was started.
    #[error("service group '{group}' has not been started")]
    NotStarted {
        /// Group name.
        group: String,
    },

    /// The service name is not declared by the group definition.
    #[error("service '{service}' is not part of group '{group}'")]
    UnknownService {
        /// Group name.
        group: String,
        /// Requested service.
        service: String,
    },

    /// The service exists but its container is not running.
    #[error("service '{service}' in group '{group}' is not running")]
    ServiceNotRunning {
        /// Group name.
        group: String,
        /// Requested service.
        service: String,
    },

    /// The readiness probe never reported success.
    #[error("{target} not ready after {attempts} attempts; last output: {last_output}")]
    ReadinessTimeout {
        /// Probed service.
        target: String,
        /// Attempts made.
        attempts: u32,
        /// Output of the final probe.
        last_output: String,
    },

    /// The group definition could not be loaded.
    #[error("invalid service group definition {path}: {message}")]
    Definition {
        /// Compose file that was read.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A host directory could not be prepared.
    #[error("failed to prepare host directory {path}: {source}")]
    HostDirectory {
        /// Directory being prepared.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl HarnessError {
    /// Reports whether retrying the same probe could succeed.
    ///
    /// Readiness polling counts these as failed attempts; every other error
    /// aborts the poll.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ContainerExecution { .. } | Self::CommandTimeout { .. }
        )
    }
}

fn describe_status(status: impl Borrow<Option<i32>>) -> String {
    match status.borrow() {
        Some(code) => format!("status {code}"),
        None => String::from("no exit status (terminated by signal)"),
    }
}
