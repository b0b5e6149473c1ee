//! Package manager backends
//!
//! `PackageManager` is the seam between the provisioner's policy logic and the
//! subprocesses that actually resolve and install modules.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::python::PythonRuntime;
use super::InstallError;

/// Reports the names that `importlib` cannot locate. `find_spec` on a
/// top-level name only searches `sys.path`; it never imports the module.
const FIND_MISSING_SCRIPT: &str = r#"
import importlib.util, json, sys
missing = []
for name in sys.argv[1:]:
    try:
        found = importlib.util.find_spec(name) is not None
    except (ImportError, ValueError):
        found = False
    if not found:
        missing.append(name)
print(json.dumps(missing))
"#;

/// Trait for module resolution/installation backends
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    /// Subset of `modules` that does not resolve in the runtime
    async fn find_missing(
        &self,
        modules: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, InstallError>;

    /// Install every module in `modules` with a single invocation
    async fn install(&self, modules: &BTreeSet<String>) -> Result<(), InstallError>;
}

/// pip-backed package manager
pub struct PipPackageManager {
    runtime: PythonRuntime,
    /// Program plus leading arguments, e.g. `python3 -m pip`
    installer: Vec<String>,
    label: String,
}

impl PipPackageManager {
    /// Install through `<interpreter> -m pip`, so packages land where the
    /// interpreter resolves them.
    pub fn new(runtime: PythonRuntime) -> Self {
        let installer = vec![
            runtime.interpreter().to_string(),
            "-m".to_string(),
            "pip".to_string(),
        ];
        Self::from_parts(runtime, installer)
    }

    /// Install through a separate pip executable
    pub fn with_installer(runtime: PythonRuntime, installer: impl Into<String>) -> Self {
        Self::from_parts(runtime, vec![installer.into()])
    }

    fn from_parts(runtime: PythonRuntime, installer: Vec<String>) -> Self {
        let label = installer.join(" ");
        PipPackageManager {
            runtime,
            installer,
            label,
        }
    }

    fn install_command(&self, modules: &BTreeSet<String>) -> Command {
        // Never reuse the local cache: a previous failed attempt can leave it half-populated.
        let mut command = Command::new(&self.installer[0]);
        command
            .args(&self.installer[1..])
            .arg("install")
            .arg("--no-cache-dir")
            .args(modules)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PackageManager for PipPackageManager {
    fn name(&self) -> &str {
        &self.label
    }

    async fn find_missing(
        &self,
        modules: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, InstallError> {
        if modules.is_empty() {
            return Ok(BTreeSet::new());
        }

        let args: Vec<&str> = modules.iter().map(String::as_str).collect();
        let output = self
            .runtime
            .run_script(FIND_MISSING_SCRIPT, &args, None)
            .await
            .map_err(|e| InstallError::Probe(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(InstallError::Probe(stderr));
        }

        let missing: BTreeSet<String> = serde_json::from_slice(&output.stdout)
            .map_err(|e| InstallError::Probe(format!("unreadable probe output: {}", e)))?;
        debug!("Missing modules: {:?}", missing);
        Ok(missing)
    }

    async fn install(&self, modules: &BTreeSet<String>) -> Result<(), InstallError> {
        info!("Installing missing modules: {:?}", modules);

        let output = self
            .install_command(modules)
            .output()
            .await
            .map_err(|e| {
                error!("Failed to launch {}: {}", self.label, e);
                InstallError::SpawnFailed(e)
            })?;

        if output.status.success() {
            info!("Modules installed successfully");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} install error: {}", self.label, stderr);
            Err(InstallError::PackageManagerFailed { stderr })
        }
    }
}
