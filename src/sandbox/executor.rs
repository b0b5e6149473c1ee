//! Common executor trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::limits::ResourceLimits;
use super::wrapper::WrappedUnit;
use crate::error::{Error, Result};

/// Request to execute code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source defining a `run` function
    pub code: String,
    /// Positional arguments passed to `run`
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ExecutionRequest {
    /// Create a new execution request
    pub fn new(code: impl Into<String>) -> Self {
        ExecutionRequest {
            code: code.into(),
            args: Vec::new(),
        }
    }

    /// Set arguments
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Reject requests that cannot possibly run
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(Error::InvalidInput("code must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Captured output of a child that ran to completion (any exit code)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Why an execution produced no output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Wall-clock timeout elapsed; the process group was killed
    Timeout,
    /// Reserved: rlimit kills surface as a non-zero exit code instead
    ResourceLimitExceeded,
    /// A dependency was missing and could not (or may not) be installed
    DependencyInstallFailed,
    /// The interpreter could not be started
    ProcessSpawnError,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::ResourceLimitExceeded => write!(f, "resource_limit_exceeded"),
            FailureReason::DependencyInstallFailed => write!(f, "dependency_install_failed"),
            FailureReason::ProcessSpawnError => write!(f, "process_spawn_error"),
            FailureReason::Unknown => write!(f, "unknown"),
        }
    }
}

/// Result of code execution: exactly one of output or failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The child ran and exited (possibly non-zero)
    Success(ExecutionOutput),
    /// Infrastructure failure before or during the run
    Failure {
        reason: FailureReason,
        message: String,
    },
}

impl ExecutionResult {
    /// Create a completed result
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        ExecutionResult::Success(ExecutionOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        })
    }

    /// Create a failure result
    pub fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        ExecutionResult::Failure {
            reason,
            message: message.into(),
        }
    }

    /// Create a timeout result
    pub fn timeout(timeout: Duration) -> Self {
        ExecutionResult::failure(
            FailureReason::Timeout,
            format!("Execution timed out after {}s", timeout.as_secs_f64()),
        )
    }

    /// Did the child run to completion?
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success(_))
    }

    /// Failure reason, if any
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            ExecutionResult::Failure { reason, .. } => Some(*reason),
            ExecutionResult::Success(_) => None,
        }
    }

    /// Output of a completed run, if any
    pub fn output(&self) -> Option<&ExecutionOutput> {
        match self {
            ExecutionResult::Success(output) => Some(output),
            ExecutionResult::Failure { .. } => None,
        }
    }
}

/// Trait for code execution backends
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Get the executor name
    fn name(&self) -> &str;

    /// Run `unit` under `limits`. Never fails: every outcome is an `ExecutionResult`.
    async fn execute(&self, unit: &WrappedUnit, limits: &ResourceLimits) -> ExecutionResult;
}
