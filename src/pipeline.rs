//! Request pipeline: extract imports, provision, wrap, execute

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::deps::{extract_imports, PipPackageManager, Provisioner, PythonRuntime};
use crate::error::{Error, Result};
use crate::sandbox::{
    create_executor, wrap, CodeExecutor, ExecutionRequest, ExecutionResult, FailureReason,
    ResourceLimits,
};

/// Runs submitted snippets end to end.
///
/// At most `max_concurrent` children run at once; further requests wait for a
/// permit after their dependencies are in place.
pub struct CodeRunner {
    runtime: PythonRuntime,
    provisioner: Provisioner,
    executor: Arc<dyn CodeExecutor>,
    limits: ResourceLimits,
    permits: Semaphore,
}

impl CodeRunner {
    pub fn new(
        runtime: PythonRuntime,
        provisioner: Provisioner,
        executor: Arc<dyn CodeExecutor>,
        limits: ResourceLimits,
        max_concurrent: usize,
    ) -> Self {
        CodeRunner {
            runtime,
            provisioner,
            executor,
            limits,
            permits: Semaphore::new(max_concurrent),
        }
    }

    /// Wire up pip, the OS sandbox and the host-enforceable limits from `config`
    pub fn from_config(config: &Config) -> Self {
        let runtime = PythonRuntime::new(config.runtime.python_bin.clone());
        let manager = match &config.runtime.installer_bin {
            Some(installer) => PipPackageManager::with_installer(runtime.clone(), installer.clone()),
            None => PipPackageManager::new(runtime.clone()),
        };
        let provisioner = Provisioner::new(Arc::new(manager), config.install.clone());
        let executor = create_executor(&config.runtime);

        CodeRunner::new(
            runtime,
            provisioner,
            Arc::new(executor),
            config.limits.enforceable_on_host(),
            config.runtime.max_concurrent_executions,
        )
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    /// Run one request.
    ///
    /// Every outcome of the snippet itself is an `ExecutionResult`; `Err` is
    /// reserved for service plumbing (the permit pool has been closed).
    pub async fn run(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let imports = extract_imports(&self.runtime, &request.code).await;
        debug!("Imports found: {:?}", imports);

        if let Err(e) = self.provisioner.ensure_installed(&imports).await {
            warn!("Dependency provisioning failed: {}", e);
            return Ok(ExecutionResult::failure(
                FailureReason::DependencyInstallFailed,
                e.to_string(),
            ));
        }

        let unit = wrap(&request.code, &request.args);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Execution pool unavailable: {}", e)))?;

        info!("Executing snippet with {} args", request.args.len());
        Ok(self.executor.execute(&unit, &self.limits).await)
    }

    /// Stop handing out execution permits; waiting and later requests get `Err`.
    pub fn close(&self) {
        self.permits.close();
    }
}
