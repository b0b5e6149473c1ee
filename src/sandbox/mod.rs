//! Sandbox module - Bounded execution of untrusted snippets
//!
//! A snippet is wrapped into a program that calls its `run` function, written
//! to a temporary artifact, and run as a child process under CPU, memory and
//! wall-clock ceilings. The child's whole process group is killed on timeout.

mod executor;
mod limits;
mod os_sandbox;
pub(crate) mod process;
mod wrapper;

pub use executor::{
    CodeExecutor, ExecutionOutput, ExecutionRequest, ExecutionResult, FailureReason,
};
pub use limits::{supports_address_space_limit, ResourceLimits};
pub use os_sandbox::OsSandbox;
pub use wrapper::{wrap, WrappedUnit, ENTRY_FUNCTION};

use crate::config::RuntimeConfig;

/// Create the executor used for user code
pub fn create_executor(runtime: &RuntimeConfig) -> OsSandbox {
    OsSandbox::new(runtime.python_bin.clone(), runtime.scratch_dir.clone())
}
