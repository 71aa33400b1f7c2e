//! Command runner used by scenarios and the cluster controller.
//!
//! [`CommandRunner`] pairs a [`ProcessExecutor`] with the container runtime
//! program and the default per-command timeout. It offers the three
//! execution surfaces the harness needs: plain host commands, throw-away
//! containers (`docker run --rm`), and `docker compose` subcommands scoped to
//! one project.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cluster_harness_config::HarnessConfig;
use tracing::debug;

use crate::command::{CommandOutput, ContainerCommand, Invocation, NetworkConfig};
use crate::error::HarnessError;
use crate::process::{ProcessExecutor, SystemExecutor};

/// Tracing target for runner operations.
const RUNNER_TARGET: &str = "cluster_harness::runner";

/// Executes commands on the host or inside containers.
///
/// # Example
///
/// ```rust,no_run
/// use cluster_harness::{CommandRunner, ContainerCommand, NetworkConfig};
/// use cluster_harness_config::HarnessConfig;
///
/// let runner = CommandRunner::from_config(&HarnessConfig::default());
/// let command = ContainerCommand::new("kafkacat").args(["-L", "-b", "localhost:19092", "-J"]);
/// let output = runner
///     .run_in_container("confluentinc/kafkacat", &command, &NetworkConfig::host())
///     .expect("metadata query");
/// println!("{}", output.stdout());
/// ```
#[derive(Debug, Clone)]
pub struct CommandRunner<E = SystemExecutor> {
    executor: E,
    docker_program: String,
    command_timeout: Duration,
}

impl CommandRunner<SystemExecutor> {
    /// Builds a runner that spawns real processes.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(SystemExecutor, config)
    }
}

impl<E> CommandRunner<E> {
    /// Builds a runner around an arbitrary executor.
    #[must_use]
    pub fn new(executor: E, config: &HarnessConfig) -> Self {
        Self {
            executor,
            docker_program: config.docker_program().to_owned(),
            command_timeout: config.command_timeout(),
        }
    }

    /// Returns the underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Program used to reach the container runtime.
    #[must_use]
    pub fn docker_program(&self) -> &str {
        &self.docker_program
    }

    /// Default budget applied to invocations without their own timeout.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Starts an invocation of the container runtime program.
    #[must_use]
    pub fn docker(&self) -> Invocation {
        Invocation::new(self.docker_program.as_str())
    }
}

impl<E: ProcessExecutor> CommandRunner<E> {
    /// Runs an invocation and returns its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Propagates launch, wait and timeout failures from the executor.
    pub fn execute(&self, invocation: Invocation) -> Result<CommandOutput, HarnessError> {
        let invocation = invocation.with_default_timeout(self.command_timeout);
        self.executor.execute(&invocation)
    }

    /// Runs a command on the host and requires it to succeed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::HostExecution`] for a non-zero exit and
    /// propagates launch, wait and timeout failures.
    pub fn run_on_host(&self, invocation: Invocation) -> Result<CommandOutput, HarnessError> {
        let command = invocation.to_string();
        let output = self.execute(invocation)?;
        if output.success() {
            return Ok(output);
        }
        Err(HarnessError::HostExecution {
            command,
            status: output.status(),
            stderr: output.stderr().trim().to_owned(),
        })
    }

    /// Runs `command` in a fresh, automatically removed container.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ContainerExecution`] for a non-zero exit and
    /// propagates launch, wait and timeout failures.
    pub fn run_in_container(
        &self,
        image: &str,
        command: &ContainerCommand,
        network: &NetworkConfig,
    ) -> Result<CommandOutput, HarnessError> {
        let invocation = self
            .docker()
            .args(["run", "--rm", "--network", network.network_mode.as_str(), image])
            .args(command.argv().iter().cloned());

        debug!(
            target: RUNNER_TARGET,
            image,
            network = network.network_mode.as_str(),
            command = %command,
            "running throw-away container"
        );

        let output = self.execute(invocation)?;
        if output.success() {
            return Ok(output);
        }
        Err(HarnessError::ContainerExecution {
            target: image.to_owned(),
            command: command.to_string(),
            status: output.status(),
            stderr: output.stderr().trim().to_owned(),
        })
    }

    /// Runs a `docker compose` subcommand scoped to `project`.
    ///
    /// # Errors
    ///
    /// Propagates launch, wait and timeout failures; exit statuses are left
    /// to the caller.
    pub fn run_compose<I, S>(
        &self,
        project: &ComposeProject,
        args: I,
    ) -> Result<CommandOutput, HarnessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = project.invocation(self.docker()).args(args);
        self.execute(invocation)
    }
}

/// Identifies one `docker compose` project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    name: String,
    compose_file: PathBuf,
    project_dir: PathBuf,
}

impl ComposeProject {
    /// Describes a project named `name` defined by `compose_file`.
    ///
    /// The name is normalised to the character set compose accepts:
    /// lowercase ASCII letters, digits, `-` and `_`.
    #[must_use]
    pub fn new(name: &str, compose_file: PathBuf, project_dir: PathBuf) -> Self {
        Self {
            name: normalise_project_name(name),
            compose_file,
            project_dir,
        }
    }

    /// Normalised project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compose file path.
    #[must_use]
    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    /// Prefixes `base` with the compose project selection flags.
    #[must_use]
    pub fn invocation(&self, base: Invocation) -> Invocation {
        base.args([
            String::from("compose"),
            String::from("--project-name"),
            self.name.clone(),
            String::from("--file"),
            self.compose_file.to_string_lossy().into_owned(),
            String::from("--project-directory"),
            self.project_dir.to_string_lossy().into_owned(),
        ])
    }
}

fn normalise_project_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch.to_ascii_lowercase() {
            lower @ ('a'..='z' | '0'..='9' | '-' | '_') => lower,
            _ => '-',
        })
        .collect()
}
