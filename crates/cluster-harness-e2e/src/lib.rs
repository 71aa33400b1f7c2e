//! End-to-end scenarios for the cluster harness.
//!
//! This crate exercises [`cluster_harness`] against a real container runtime
//! using Kafka and ZooKeeper compose fixtures. It provides:
//!
//! - [`fixtures`]: fixture locations, group definitions and expected
//!   configuration blocks
//! - [`probes`]: readiness and reachability probes run inside containers
//! - [`metadata`]: parsing of `kafkacat -L -J` broker metadata
//!
//! # Graceful Skipping
//!
//! Scenarios skip when `docker` or its compose plugin is not available, so
//! the workspace test suite stays green on hosts without a container runtime.

use std::process::{Command, Stdio};
use std::sync::Arc;

use cluster_harness::{
    CommandRunner, HarnessError, ReadinessPoller, ServiceGroupDefinition, TestCluster,
};
use cluster_harness_config::HarnessConfig;
use ortho_config::OrthoError;

pub mod fixtures;
pub mod metadata;
pub mod probes;

/// Checks if a command is available on the system PATH.
#[must_use]
pub fn command_available(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Checks that the docker daemon answers and the compose plugin is installed.
#[must_use]
pub fn docker_available() -> bool {
    if !command_available("docker") {
        return false;
    }
    let succeeds = |args: &[&str]| {
        Command::new("docker")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    };
    succeeds(&["info"]) && succeeds(&["compose", "version"])
}

/// Configuration shared by the scenarios, layered from `HARNESS_*`
/// overrides on top of the defaults.
///
/// # Errors
///
/// Returns the loader error when an override cannot be parsed, so a typo in
/// the environment fails the scenario instead of being ignored.
pub fn scenario_config() -> Result<HarnessConfig, Arc<OrthoError>> {
    HarnessConfig::load_from_env()
}

/// Starts `definition` and waits for its ZooKeeper service.
///
/// # Errors
///
/// Returns the first harness error raised while starting the group or
/// polling ZooKeeper. The cluster is shut down when dropped either way.
pub fn start_with_zookeeper(
    definition: ServiceGroupDefinition,
    config: &HarnessConfig,
) -> Result<TestCluster, HarnessError> {
    let mut cluster = TestCluster::new(definition, CommandRunner::from_config(config))?;
    cluster.start()?;
    cluster.wait_until_ready(
        fixtures::ZOOKEEPER_SERVICE,
        &probes::zookeeper_ready(),
        &ReadinessPoller::from_config(config),
    )?;
    Ok(cluster)
}
