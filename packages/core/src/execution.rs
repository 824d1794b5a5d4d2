//! Outcome of running a job's command.
//!
//! A failing command is ordinary data here: it travels inside an
//! [`ExecutionResult`] and is routed through the retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Why a command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The shell could not be started.
    #[error("failed to start command: {message}")]
    Spawn { message: String },
    /// The command exited with a non-zero status.
    #[error("command exited with status {code}{}", detail(.stderr))]
    Exit { code: i32, stderr: String },
    /// The command was killed by a signal.
    #[error("command terminated by signal{}", detail(.stderr))]
    Signal { stderr: String },
    /// The command ran past its deadline and was killed.
    #[error("command timed out after {}s", .timeout.as_secs())]
    TimedOut { timeout: Duration },
}

fn detail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the command exited with status zero.
    pub success: bool,
    /// Trimmed standard output.
    pub output: String,
    /// Failure cause, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    /// Exit status when the process exited normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            exit_code: Some(0),
        }
    }

    pub fn failed(error: ExecutionError, output: impl Into<String>) -> Self {
        let exit_code = match &error {
            ExecutionError::Exit { code, .. } => Some(*code),
            _ => None,
        };
        Self {
            success: false,
            output: output.into(),
            error: Some(error),
            exit_code,
        }
    }

    /// Message recorded on the job when this result is a failure.
    pub fn failure_message(&self) -> String {
        match &self.error {
            Some(error) => error.to_string(),
            None if !self.output.is_empty() => self.output.clone(),
            None => "command failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_failure_carries_code_and_stderr() {
        let result = ExecutionResult::failed(
            ExecutionError::Exit {
                code: 2,
                stderr: "no such file".into(),
            },
            "",
        );
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(
            result.failure_message(),
            "command exited with status 2: no such file"
        );
    }

    #[test]
    fn timeout_message_names_the_deadline() {
        let result = ExecutionResult::failed(
            ExecutionError::TimedOut {
                timeout: Duration::from_secs(30),
            },
            "partial",
        );
        assert_eq!(result.exit_code, None);
        assert_eq!(result.failure_message(), "command timed out after 30s");
    }
}
