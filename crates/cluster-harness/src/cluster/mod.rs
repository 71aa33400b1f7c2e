//! Lifecycle controller for one service group.
//!
//! [`TestCluster`] owns a compose project from `start()` to `shutdown()`.
//! It tracks each declared service as a [`ServiceHandle`], resolves service
//! names before touching the runtime, and refreshes container state on demand
//! so commands are never sent to a container that has already exited.
//!
//! Readiness is not part of `start()`: a coordination service and a broker
//! become ready in different ways, so callers poll each service explicitly
//! through [`TestCluster::wait_until_ready`].
//!
//! Teardown is guaranteed: `shutdown()` is idempotent and never fails, and
//! dropping the cluster calls it. A scenario that panics half-way still
//! leaves no containers, networks, volumes or host directories behind.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::command::{CommandOutput, ContainerCommand};
use crate::definition::ServiceGroupDefinition;
use crate::error::HarnessError;
use crate::host_dir::HostDirectoryGuard;
use crate::process::{ProcessExecutor, SystemExecutor};
use crate::readiness::ReadinessPoller;
use crate::runner::{CommandRunner, ComposeProject};

/// Tracing target for cluster lifecycle operations.
const CLUSTER_TARGET: &str = "cluster_harness::cluster";

/// Lifecycle state of one service container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Launched by `start()`, not yet inspected.
    Starting,
    /// Container is running.
    Running,
    /// Container exited.
    Stopped,
    /// Container no longer exists.
    Removed,
}

impl ServiceState {
    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
        }
    }
}

/// One service within a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    name: String,
    state: ServiceState,
}

impl ServiceHandle {
    fn new(name: String) -> Self {
        Self {
            name,
            state: ServiceState::Removed,
        }
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last observed state.
    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupPhase {
    Defined,
    Started,
    ShutDown,
}

/// Controller for a multi-service deployment defined by a compose fixture.
///
/// # Example
///
/// ```rust,no_run
/// use cluster_harness::{
///     CommandRunner, ContainerCommand, ReadinessPoller, ServiceGroupDefinition, TestCluster,
/// };
/// use cluster_harness_config::HarnessConfig;
///
/// # fn main() -> Result<(), cluster_harness::HarnessError> {
/// let config = HarnessConfig::default();
/// let definition =
///     ServiceGroupDefinition::new("config-test", "fixtures/kafka", "standalone-config.yml");
/// let mut cluster = TestCluster::new(definition, CommandRunner::from_config(&config))?;
/// cluster.start()?;
///
/// let probe = ContainerCommand::shell(
///     "cub zk-ready localhost:2181 10 10 2 && echo PASS || echo FAIL",
/// );
/// cluster.wait_until_ready("zookeeper", &probe, &ReadinessPoller::from_config(&config))?;
///
/// let props = cluster.run_command_on_service(
///     "default-config",
///     &ContainerCommand::new("cat").arg("/etc/kafka/server.properties"),
/// )?;
/// assert!(props.contains("broker.id=1"));
/// cluster.shutdown();
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct TestCluster<E: ProcessExecutor = SystemExecutor> {
    definition: ServiceGroupDefinition,
    project: ComposeProject,
    runner: CommandRunner<E>,
    services: BTreeMap<String, ServiceHandle>,
    phase: GroupPhase,
    host_directories: Option<HostDirectoryGuard>,
}

impl<E: ProcessExecutor> TestCluster<E> {
    /// Builds a controller, reading the service list from the compose file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Definition`] when the compose file cannot be
    /// read or declares no services.
    pub fn new(
        definition: ServiceGroupDefinition,
        runner: CommandRunner<E>,
    ) -> Result<Self, HarnessError> {
        let services = definition
            .load_services()?
            .into_iter()
            .map(|spec| {
                let name = spec.name().to_owned();
                (name.clone(), ServiceHandle::new(name))
            })
            .collect();
        let project = ComposeProject::new(
            definition.name(),
            definition.compose_path(),
            definition.fixture_dir().to_path_buf(),
        );
        Ok(Self {
            definition,
            project,
            runner,
            services,
            phase: GroupPhase::Defined,
            host_directories: None,
        })
    }

    /// Group definition.
    #[must_use]
    pub const fn definition(&self) -> &ServiceGroupDefinition {
        &self.definition
    }

    /// Command runner shared with scenarios.
    #[must_use]
    pub const fn runner(&self) -> &CommandRunner<E> {
        &self.runner
    }

    /// Declared services in name order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.services.values()
    }

    /// Looks up a declared service.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&ServiceHandle> {
        self.services.get(name)
    }

    /// Brings every declared service up without waiting for readiness.
    ///
    /// Host directories are prepared first. The group counts as started even
    /// when compose fails half-way, so a later `shutdown()` still removes
    /// whatever was created.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::AlreadyStarted`] on a second call,
    /// [`HarnessError::HostDirectory`] when a directory cannot be prepared,
    /// and [`HarnessError::GroupStart`] when compose fails.
    pub fn start(&mut self) -> Result<(), HarnessError> {
        if self.phase != GroupPhase::Defined {
            return Err(HarnessError::AlreadyStarted {
                group: self.group_name(),
            });
        }

        self.host_directories = Some(HostDirectoryGuard::acquire(
            self.definition.host_directories(),
        )?);
        self.phase = GroupPhase::Started;
        for handle in self.services.values_mut() {
            handle.state = ServiceState::Starting;
        }

        info!(
            target: CLUSTER_TARGET,
            group = self.project.name(),
            compose_file = %self.project.compose_file().display(),
            services = self.services.len(),
            "starting service group"
        );

        let output = self
            .runner
            .run_compose(&self.project, ["up", "-d"])
            .map_err(|err| HarnessError::GroupStart {
                group: self.group_name(),
                message: err.to_string(),
            })?;
        if !output.success() {
            return Err(HarnessError::GroupStart {
                group: self.group_name(),
                message: output.stderr().trim().to_owned(),
            });
        }

        info!(target: CLUSTER_TARGET, group = self.project.name(), "service group started");
        Ok(())
    }

    /// Runs `command` inside the running container of `service`.
    ///
    /// Returns the command's standard output.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownService`] for undeclared names,
    /// [`HarnessError::NotStarted`] before `start()`,
    /// [`HarnessError::ServiceNotRunning`] when the container has exited,
    /// and [`HarnessError::ContainerExecution`] when the command fails.
    pub fn run_command_on_service(
        &mut self,
        service: &str,
        command: &ContainerCommand,
    ) -> Result<String, HarnessError> {
        self.ensure_declared(service)?;
        self.ensure_started()?;
        if self.refresh_state(service)? != ServiceState::Running {
            return Err(self.not_running(service));
        }
        self.exec(service, command).map(CommandOutput::into_stdout)
    }

    /// Runs `command` in every running service.
    ///
    /// Services whose containers are not running are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotStarted`] before `start()` and the first
    /// command failure otherwise.
    pub fn run_command_on_all(
        &mut self,
        command: &ContainerCommand,
    ) -> Result<BTreeMap<String, String>, HarnessError> {
        self.ensure_started()?;
        let names: Vec<String> = self.services.keys().cloned().collect();
        let mut outputs = BTreeMap::new();
        for name in names {
            let state = self.refresh_state(&name)?;
            if state != ServiceState::Running {
                debug!(
                    target: CLUSTER_TARGET,
                    service = %name,
                    state = state.as_str(),
                    "skipping service that is not running"
                );
                continue;
            }
            let output = self.exec(&name, command)?;
            outputs.insert(name, output.into_stdout());
        }
        Ok(outputs)
    }

    /// Returns the accumulated log output of `service`.
    ///
    /// With `stopped` set the caller expects the service to have exited,
    /// for example because its configuration is deliberately incomplete, and
    /// the container's state is not checked. Without it the service must be
    /// running.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownService`] for undeclared names,
    /// [`HarnessError::NotStarted`] before `start()`,
    /// [`HarnessError::ServiceNotRunning`] when `stopped` is false and the
    /// container has exited, and [`HarnessError::ContainerExecution`] when
    /// compose cannot read the logs.
    pub fn service_logs(&mut self, service: &str, stopped: bool) -> Result<String, HarnessError> {
        self.ensure_declared(service)?;
        self.ensure_started()?;
        let state = self.refresh_state(service)?;
        if !stopped && state != ServiceState::Running {
            return Err(self.not_running(service));
        }

        let output = self.runner.run_compose(
            &self.project,
            ["logs", "--no-color", "--no-log-prefix", service],
        )?;
        if !output.success() {
            return Err(HarnessError::ContainerExecution {
                target: service.to_owned(),
                command: String::from("logs"),
                status: output.status(),
                stderr: output.stderr().trim().to_owned(),
            });
        }
        // Compose relays container stderr on its own stderr stream.
        Ok(output.combined())
    }

    /// Inspects the container of `service` and records its state.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownService`] for undeclared names,
    /// [`HarnessError::NotStarted`] before `start()`, and runtime failures.
    pub fn service_state(&mut self, service: &str) -> Result<ServiceState, HarnessError> {
        self.ensure_declared(service)?;
        self.ensure_started()?;
        self.refresh_state(service)
    }

    /// Polls `probe` inside `service` until it prints `PASS`.
    ///
    /// Returns the number of probes it took.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ReadinessTimeout`] when the budget is spent and
    /// propagates non-transient errors such as an unknown service.
    pub fn wait_until_ready(
        &mut self,
        service: &str,
        probe: &ContainerCommand,
        poller: &ReadinessPoller,
    ) -> Result<u32, HarnessError> {
        poller.require(service, || self.run_command_on_service(service, probe))
    }

    /// Whether the group is up: started, not shut down, and at least one
    /// service container running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        if self.phase != GroupPhase::Started {
            return false;
        }
        match self
            .runner
            .run_compose(&self.project, ["ps", "--quiet", "--status", "running"])
        {
            Ok(output) if output.success() => !output.stdout().trim().is_empty(),
            Ok(output) => {
                warn!(
                    target: CLUSTER_TARGET,
                    group = self.project.name(),
                    stderr = output.stderr().trim(),
                    "failed to list running containers"
                );
                false
            }
            Err(error) => {
                warn!(
                    target: CLUSTER_TARGET,
                    group = self.project.name(),
                    %error,
                    "failed to list running containers"
                );
                false
            }
        }
    }

    /// Stops and removes every container, network and volume of the group,
    /// then releases host directories.
    ///
    /// Idempotent and infallible: failures are logged so they never mask the
    /// error that ended the scenario.
    pub fn shutdown(&mut self) {
        if self.phase == GroupPhase::Started {
            info!(target: CLUSTER_TARGET, group = self.project.name(), "shutting down service group");
            match self.runner.run_compose(
                &self.project,
                ["down", "--volumes", "--remove-orphans"],
            ) {
                Ok(output) if output.success() => {}
                Ok(output) => warn!(
                    target: CLUSTER_TARGET,
                    group = self.project.name(),
                    status = ?output.status(),
                    stderr = output.stderr().trim(),
                    "compose down failed"
                ),
                Err(error) => warn!(
                    target: CLUSTER_TARGET,
                    group = self.project.name(),
                    %error,
                    "compose down failed"
                ),
            }
            for handle in self.services.values_mut() {
                handle.state = ServiceState::Removed;
            }
        }
        drop(self.host_directories.take());
        self.phase = GroupPhase::ShutDown;
    }

    fn exec(
        &self,
        service: &str,
        command: &ContainerCommand,
    ) -> Result<CommandOutput, HarnessError> {
        debug!(
            target: CLUSTER_TARGET,
            service,
            command = %command,
            "executing in service"
        );
        let mut args = vec![String::from("exec"), String::from("-T"), service.to_owned()];
        args.extend(command.argv().iter().cloned());
        let output = self.runner.run_compose(&self.project, args)?;
        if output.success() {
            return Ok(output);
        }
        Err(HarnessError::ContainerExecution {
            target: service.to_owned(),
            command: command.to_string(),
            status: output.status(),
            stderr: output.stderr().trim().to_owned(),
        })
    }

    /// Resolves the container of `service` and records its state.
    fn refresh_state(&mut self, service: &str) -> Result<ServiceState, HarnessError> {
        let state = match self.container_id(service)? {
            None => ServiceState::Removed,
            Some(id) => self.inspect_running(&id)?,
        };
        if let Some(handle) = self.services.get_mut(service)
            && handle.state != state
        {
            debug!(
                target: CLUSTER_TARGET,
                service,
                from = handle.state.as_str(),
                to = state.as_str(),
                "service state changed"
            );
            handle.state = state;
        }
        Ok(state)
    }

    fn container_id(&self, service: &str) -> Result<Option<String>, HarnessError> {
        let output = self
            .runner
            .run_compose(&self.project, ["ps", "--all", "--quiet", service])?;
        if !output.success() {
            return Err(HarnessError::ContainerExecution {
                target: service.to_owned(),
                command: String::from("ps"),
                status: output.status(),
                stderr: output.stderr().trim().to_owned(),
            });
        }
        Ok(output
            .stdout()
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned))
    }

    fn inspect_running(&self, container_id: &str) -> Result<ServiceState, HarnessError> {
        let invocation = self
            .runner
            .docker()
            .args(["inspect", "--format", "{{.State.Running}}", container_id]);
        let output = self.runner.execute(invocation)?;
        if !output.success() {
            // The container vanished between `ps` and `inspect`.
            return Ok(ServiceState::Removed);
        }
        Ok(if output.stdout().trim() == "true" {
            ServiceState::Running
        } else {
            ServiceState::Stopped
        })
    }

    fn ensure_declared(&self, service: &str) -> Result<(), HarnessError> {
        if self.services.contains_key(service) {
            return Ok(());
        }
        Err(HarnessError::UnknownService {
            group: self.group_name(),
            service: service.to_owned(),
        })
    }

    fn ensure_started(&self) -> Result<(), HarnessError> {
        if self.phase == GroupPhase::Started {
            return Ok(());
        }
        Err(HarnessError::NotStarted {
            group: self.group_name(),
        })
    }

    fn not_running(&self, service: &str) -> HarnessError {
        HarnessError::ServiceNotRunning {
            group: self.group_name(),
            service: service.to_owned(),
        }
    }

    fn group_name(&self) -> String {
        self.definition.name().to_owned()
    }
}

impl<E: ProcessExecutor> Drop for TestCluster<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
