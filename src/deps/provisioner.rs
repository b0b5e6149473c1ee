//! Dependency provisioning ahead of execution

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::manager::PackageManager;
use super::policy::InstallPolicy;
use super::InstallError;

/// Makes sure every module a snippet imports resolves before it runs.
///
/// Resolution checks run concurrently; installer invocations are serialized
/// through `install_lock` so two requests never drive the package manager at
/// the same time.
pub struct Provisioner {
    manager: Arc<dyn PackageManager>,
    policy: InstallPolicy,
    install_lock: Mutex<()>,
}

impl Provisioner {
    pub fn new(manager: Arc<dyn PackageManager>, policy: InstallPolicy) -> Self {
        Provisioner {
            manager,
            policy,
            install_lock: Mutex::new(()),
        }
    }

    /// Install whatever in `modules` is missing, or fail without installing anything.
    pub async fn ensure_installed(&self, modules: &BTreeSet<String>) -> Result<(), InstallError> {
        if modules.is_empty() {
            return Ok(());
        }

        let missing = self.manager.find_missing(modules).await?;
        if missing.is_empty() {
            debug!("All imported modules already available");
            return Ok(());
        }

        let refused = self.policy.refused(&missing);
        if !refused.is_empty() {
            warn!(
                "Install policy ({}) refused modules: {:?}",
                self.policy.mode(),
                refused
            );
            return Err(InstallError::Denied(refused));
        }

        let _guard = self.install_lock.lock().await;

        // Another request may have installed some of these while we waited.
        let missing = self.manager.find_missing(&missing).await?;
        if missing.is_empty() {
            return Ok(());
        }

        debug!("Installing {:?} via {}", missing, self.manager.name());
        self.manager.install(&missing).await
    }
}
