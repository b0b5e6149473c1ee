//! OS-level sandboxed execution
//!
//! Runs the wrapped program as a plain child process of the service, bounded by
//! rlimits and a wall-clock timeout. There is no namespace or filesystem
//! isolation here: only coarse ceilings and kill-on-timeout.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::executor::{CodeExecutor, ExecutionResult, FailureReason};
use super::limits::ResourceLimits;
use super::process::ProcessGroup;
use super::wrapper::WrappedUnit;

/// Variables passed through to the child; everything else (credentials
/// included) is scrubbed from its environment.
const PASSTHROUGH_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "TMPDIR",
    "PYTHONPATH",
    "PYTHONHOME",
    "VIRTUAL_ENV",
    "SYSTEMROOT",
];

/// OS-level sandbox executor
pub struct OsSandbox {
    /// Interpreter that runs the artifact
    interpreter: String,
    /// Directory for temporary artifacts
    scratch_dir: PathBuf,
}

impl OsSandbox {
    /// Create a new OS sandbox
    pub fn new(interpreter: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        OsSandbox {
            interpreter: interpreter.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Persist the program under a unique name; deleted when the handle drops.
    fn write_artifact(&self, unit: &WrappedUnit) -> io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("coderun-")
            .suffix(".py")
            .tempfile_in(&self.scratch_dir)?;
        file.write_all(unit.as_str().as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    fn build_command(&self, artifact: &NamedTempFile, limits: &ResourceLimits) -> Command {
        let mut command = Command::new(&self.interpreter);
        command
            .arg(artifact.path())
            .env_clear()
            .envs(scrubbed_env(std::env::vars_os()))
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .current_dir(&self.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let limits = *limits;
            command.process_group(0);
            // SAFETY: the hook only issues setrlimit syscalls; it does not
            // allocate, lock, or touch state shared with the parent.
            unsafe {
                command.pre_exec(move || limits.apply_to_current_process());
            }
        }
        #[cfg(not(unix))]
        let _ = limits;

        command
    }
}

#[async_trait]
impl CodeExecutor for OsSandbox {
    fn name(&self) -> &str {
        "os"
    }

    async fn execute(&self, unit: &WrappedUnit, limits: &ResourceLimits) -> ExecutionResult {
        let artifact = match self.write_artifact(unit) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("Failed to write execution artifact: {}", e);
                return ExecutionResult::failure(
                    FailureReason::Unknown,
                    format!("Failed to write execution artifact: {}", e),
                );
            }
        };
        debug!("Executing code at {}", artifact.path().display());

        let start = Instant::now();
        let mut child = match self.build_command(&artifact, limits).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", self.interpreter, e);
                return ExecutionResult::failure(
                    FailureReason::ProcessSpawnError,
                    format!("Failed to spawn process: {}", e),
                );
            }
        };

        // From here on, every return path (and cancellation) kills the group.
        let mut group = ProcessGroup::of(&child);
        let mut stdout = tokio::spawn(read_to_end(child.stdout.take()));
        let mut stderr = tokio::spawn(read_to_end(child.stderr.take()));

        // One deadline bounds both the child and the drain of its pipes: a
        // process that left the group can hold them open indefinitely.
        let timeout = limits.wall_clock_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        let waited = tokio::time::timeout_at(deadline, child.wait()).await;

        // On timeout this is the kill; otherwise it sweeps descendants that
        // outlived the leader and would keep the pipes open.
        group.kill();

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                error!("Failed to wait for child: {}", e);
                let _ = child.kill().await;
                stdout.abort();
                stderr.abort();
                return ExecutionResult::failure(
                    FailureReason::Unknown,
                    format!("Failed to wait for process: {}", e),
                );
            }
            Err(_) => {
                warn!("Code execution timed out after {:?}", timeout);
                let _ = child.kill().await;
                stdout.abort();
                stderr.abort();
                return ExecutionResult::timeout(timeout);
            }
        };

        let drained = tokio::time::timeout_at(deadline, async {
            (collect(&mut stdout).await, collect(&mut stderr).await)
        })
        .await;

        let (stdout, stderr) = match drained {
            Ok((Ok(stdout), Ok(stderr))) => (stdout, stderr),
            Ok((Err(e), _)) | Ok((_, Err(e))) => {
                error!("Failed to collect child output: {}", e);
                return ExecutionResult::failure(
                    FailureReason::Unknown,
                    format!("Failed to collect output: {}", e),
                );
            }
            Err(_) => {
                warn!(
                    "Output still open after {:?}; a process escaped the group",
                    timeout
                );
                stdout.abort();
                stderr.abort();
                return ExecutionResult::timeout(timeout);
            }
        };

        let exit_code = exit_code(status);
        info!(
            "Execution finished with code {} in {:?}",
            exit_code,
            start.elapsed()
        );

        ExecutionResult::success(stdout.trim(), stderr.trim(), exit_code)
    }
}

/// Keep only the allowlisted variables of `parent`.
fn scrubbed_env<I>(parent: I) -> impl Iterator<Item = (OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    parent.into_iter().filter(|(key, _)| {
        key.to_str()
            .is_some_and(|key| PASSTHROUGH_ENV.contains(&key))
    })
}

async fn read_to_end<R>(pipe: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn collect(handle: &mut JoinHandle<io::Result<Vec<u8>>>) -> io::Result<String> {
    let bytes = handle.await.map_err(io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Exit code as reported by `subprocess`: negative signal number for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
