//! Dependency handling - find what a snippet imports and make it available
//!
//! - imports: static import discovery through the interpreter's own parser
//! - manager: resolution/installation backends (pip)
//! - policy: allow/deny rules for installs
//! - provisioner: ties the three together ahead of execution

mod imports;
mod manager;
mod policy;
mod provisioner;
mod python;

pub use imports::extract_imports;
pub use manager::{PackageManager, PipPackageManager};
pub use policy::{InstallPolicy, PolicyMode};
pub use provisioner::Provisioner;
pub use python::PythonRuntime;

#[cfg(test)]
pub(crate) use provisioner::tests::FakePackageManager;

use thiserror::Error;

/// Why dependencies could not be provided
#[derive(Error, Debug)]
pub enum InstallError {
    /// The install policy refused one or more modules
    #[error("Installation not permitted for: {}", .0.join(", "))]
    Denied(Vec<String>),

    /// The package manager ran and exited non-zero
    #[error("Failed to install modules: {stderr}")]
    PackageManagerFailed { stderr: String },

    /// The package manager could not be launched
    #[error("Failed to launch package manager: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// The runtime could not be asked which modules resolve
    #[error("Failed to resolve modules: {0}")]
    Probe(String),
}
