//! Integration-test harness for containerised service groups.
//!
//! The harness brings a multi-container deployment up from a compose fixture,
//! runs commands inside its services, collects their logs, and tears the
//! whole group down again, including any host directories the fixture
//! mounts. It talks to the container runtime exclusively through its CLI,
//! passing structured argument vectors rather than shell strings.
//!
//! The moving parts are:
//!
//! - [`CommandRunner`]: runs commands on the host, in throw-away containers,
//!   and as `docker compose` subcommands, each with a wall-clock timeout.
//! - [`TestCluster`]: the lifecycle controller for one service group. It
//!   resolves service names, refuses to talk to exited containers, and shuts
//!   the group down when dropped.
//! - [`ReadinessPoller`]: a bounded retry loop around probes that print
//!   `PASS` or `FAIL`, used to wait for services that start slowly.
//!
//! Configuration comes from [`cluster_harness_config::HarnessConfig`];
//! [`telemetry::initialise`] installs a `tracing` subscriber honouring its
//! log filter and format.

mod cluster;
mod command;
mod definition;
mod error;
mod host_dir;
mod process;
pub mod readiness;
mod runner;
pub mod telemetry;

pub use cluster::{ServiceHandle, ServiceState, TestCluster};
pub use command::{CommandOutput, ContainerCommand, Invocation, NetworkConfig, NetworkMode};
pub use definition::{ServiceGroupDefinition, ServiceSpec};
pub use error::HarnessError;
pub use host_dir::{HostDirectory, HostDirectoryGuard};
pub use process::{ProcessExecutor, SystemExecutor};
pub use readiness::{ReadinessOutcome, ReadinessPoller};
pub use runner::{CommandRunner, ComposeProject};
