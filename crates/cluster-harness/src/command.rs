//! Structured command descriptions.
//!
//! Commands are argument vectors from construction to `execve`. The harness
//! never concatenates arguments into a shell string; a probe that needs shell
//! operators asks for one explicitly through [`ContainerCommand::shell`].

use std::fmt;
use std::time::Duration;

/// A program plus its arguments, run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the wall-clock budget for this invocation.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the budget only when none was chosen explicitly.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        if self.timeout.is_none() {
            self.timeout = Some(timeout);
        }
        self
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Configured timeout, if any.
    #[must_use]
    pub const fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// An argument vector executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCommand {
    argv: Vec<String>,
}

impl ContainerCommand {
    /// Creates a command running `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
        }
    }

    /// Runs `script` through `bash -c`.
    ///
    /// Use this only for probes that rely on shell operators such as
    /// `&& echo PASS || echo FAIL`; the script is passed as a single argument.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program followed by its arguments.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for ContainerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    status: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    /// Builds an output record.
    #[must_use]
    pub fn new(status: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Exit code; `None` when the process was terminated by a signal.
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        self.status
    }

    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Captured standard output.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Standard output followed by standard error.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }

    /// Consumes the record, returning standard output.
    #[must_use]
    pub fn into_stdout(self) -> String {
        self.stdout
    }
}

/// Network namespace a throw-away container joins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkMode {
    /// Docker's default bridge network.
    #[default]
    Bridge,
    /// The host's network namespace.
    Host,
}

impl NetworkMode {
    /// Value passed to `docker run --network`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bridge => "bridge",
            Self::Host => "host",
        }
    }
}

/// Network options for [`crate::CommandRunner::run_in_container`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Namespace the container is attached to.
    pub network_mode: NetworkMode,
}

impl NetworkConfig {
    /// Attaches to the default bridge network.
    #[must_use]
    pub const fn bridge() -> Self {
        Self {
            network_mode: NetworkMode::Bridge,
        }
    }

    /// Shares the host network namespace.
    #[must_use]
    pub const fn host() -> Self {
        Self {
            network_mode: NetworkMode::Host,
        }
    }
}
