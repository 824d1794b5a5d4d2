//! Command executors.
//!
//! The engine never runs a command itself; it hands it to a
//! [`CommandExecutor`]. Production uses [`ShellExecutor`], tests plug in an
//! [`FnExecutor`] so they control success, failure and timing.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use queue_core::{ExecutionError, ExecutionResult};
use tokio::process::Command;

/// Upper bound on a single command's run time.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Future type for async command execution.
pub type ExecutionFuture = Pin<Box<dyn Future<Output = ExecutionResult> + Send>>;

/// Runs a job's command.
///
/// Implementations never fail: every problem, from a missing binary to a
/// timeout, comes back inside the [`ExecutionResult`].
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(&self, command: &str) -> ExecutionFuture;
}

/// Runs commands through the platform shell with a deadline.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    timeout: Duration,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> ExecutionFuture {
        let command = command.to_string();
        let timeout = self.timeout;
        Box::pin(async move { run_shell(&command, timeout).await })
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

async fn run_shell(command: &str, timeout: Duration) -> ExecutionResult {
    let mut cmd = shell(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ExecutionResult::failed(
                ExecutionError::Spawn {
                    message: e.to_string(),
                },
                "",
            );
        }
    };

    // Dropping the child on timeout kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return ExecutionResult::failed(
                ExecutionError::Spawn {
                    message: e.to_string(),
                },
                "",
            );
        }
        Err(_) => return ExecutionResult::failed(ExecutionError::TimedOut { timeout }, ""),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        return ExecutionResult::succeeded(stdout);
    }

    let error = match output.status.code() {
        Some(code) => ExecutionError::Exit { code, stderr },
        None => ExecutionError::Signal { stderr },
    };
    ExecutionResult::failed(error, stdout)
}

/// A closure-based executor.
pub struct FnExecutor<F>
where
    F: Fn(&str) -> ExecutionFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&str) -> ExecutionFuture + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> CommandExecutor for FnExecutor<F>
where
    F: Fn(&str) -> ExecutionFuture + Send + Sync + 'static,
{
    fn execute(&self, command: &str) -> ExecutionFuture {
        (self.handler)(command)
    }
}
