//! Host process execution.
//!
//! [`SystemExecutor`] implements [`ProcessExecutor`] by spawning the program
//! with stdout and stderr piped, draining both pipes on helper threads so the
//! child never blocks on a full buffer, and polling for exit until the
//! invocation's timeout elapses. The budget covers the whole call: waiting
//! for exit and for both pipes to close. On expiry the child's process group
//! is killed, including any background descendants still holding a pipe.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::command::{CommandOutput, Invocation};
use crate::error::HarnessError;

/// Tracing target for process execution.
const PROCESS_TARGET: &str = "cluster_harness::process";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Trait abstracting process execution for testability.
///
/// Implementations return the captured output whatever the exit status is;
/// callers decide which statuses count as failures. Errors are reserved for
/// processes that could not be launched, waited on, or finished in time.
pub trait ProcessExecutor {
    /// Runs the invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Spawn`] when the program cannot be launched,
    /// [`HarnessError::CommandTimeout`] when it exceeds its budget, and
    /// [`HarnessError::Io`] when waiting on it fails.
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, HarnessError>;
}

/// Executes invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, HarnessError> {
        let mut command = Command::new(invocation.program());
        command
            .args(invocation.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut command);

        debug!(
            target: PROCESS_TARGET,
            command = %invocation,
            "spawning process"
        );

        let deadline = invocation
            .get_timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut child = command.spawn().map_err(|source| HarnessError::Spawn {
            program: invocation.program().to_owned(),
            source: Arc::new(source),
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = wait_for_exit(invocation, &mut child, deadline)?;
        let stdout = collect(invocation, &child, &stdout, deadline)?;
        let stderr = collect(invocation, &child, &stderr, deadline)?;

        let output = CommandOutput::new(status.code(), stdout, stderr);
        debug!(
            target: PROCESS_TARGET,
            command = %invocation,
            status = ?output.status(),
            stdout_bytes = output.stdout().len(),
            stderr_bytes = output.stderr().len(),
            "process exited"
        );
        Ok(output)
    }
}

/// Reads a pipe to completion on a helper thread.
///
/// The text arrives on the returned channel once the write end closes,
/// which may be later than the child's exit when a descendant inherited it.
fn drain<R>(pipe: Option<R>) -> Receiver<String>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut reader) = pipe
            && let Err(error) = reader.read_to_end(&mut buffer)
        {
            debug!(target: PROCESS_TARGET, %error, "pipe read interrupted");
        }
        drop(sender.send(String::from_utf8_lossy(&buffer).into_owned()));
    });
    receiver
}

/// Waits for a drained pipe within what is left of the budget.
fn collect(
    invocation: &Invocation,
    child: &Child,
    pipe: &Receiver<String>,
    deadline: Option<Instant>,
) -> Result<String, HarnessError> {
    let received = match deadline {
        Some(deadline) => pipe.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => pipe.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(text) => Ok(text),
        Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
        Err(RecvTimeoutError::Timeout) => {
            // A background descendant still holds the pipe open.
            kill_process_group(child);
            Err(timed_out(invocation))
        }
    }
}

/// Waits for the child to exit, killing its process group at the deadline.
fn wait_for_exit(
    invocation: &Invocation,
    child: &mut Child,
    deadline: Option<Instant>,
) -> Result<ExitStatus, HarnessError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    kill_process_group(child);
                    drop(child.kill());
                    drop(child.wait());
                    return Err(timed_out(invocation));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(HarnessError::Io {
                    command: invocation.to_string(),
                    source: Arc::new(source),
                });
            }
        }
    }
}

fn timed_out(invocation: &Invocation) -> HarnessError {
    let timeout = invocation.get_timeout().unwrap_or_default();
    warn!(
        target: PROCESS_TARGET,
        command = %invocation,
        timeout_ms = timeout.as_millis(),
        "command timed out, killing process group"
    );
    HarnessError::CommandTimeout {
        command: invocation.to_string(),
        timeout,
    }
}

/// Starts the child as the leader of a new process group so that everything
/// it spawns can be killed together.
#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(child.id()) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(error) => debug!(target: PROCESS_TARGET, pgid = raw, %error, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
