//! Short-lived helper invocations of the Python interpreter
//!
//! Import extraction and module resolution both need the interpreter's own view
//! of the world (its grammar, its `sys.path`), so they run small inline scripts
//! through `python -c` rather than re-implementing either in Rust.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Upper bound for helper scripts; they never run user code.
const HELPER_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle on the Python interpreter used by the service
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    interpreter: String,
}

impl PythonRuntime {
    pub fn new(interpreter: impl Into<String>) -> Self {
        PythonRuntime {
            interpreter: interpreter.into(),
        }
    }

    /// Interpreter binary name or path
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Run `script` via `-c`, feeding `stdin` (if any) and collecting all output.
    pub(crate) async fn run_script(
        &self,
        script: &str,
        args: &[&str],
        stdin: Option<&str>,
    ) -> io::Result<Output> {
        debug!("Running helper script with {}", self.interpreter);

        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(script)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
                // Dropping the pipe closes it so the script sees EOF.
            }
        }

        match tokio::time::timeout(HELPER_TIMEOUT, child.wait_with_output()).await {
            Ok(output) => output,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("helper script exceeded {:?}", HELPER_TIMEOUT),
            )),
        }
    }
}
