//! Process-group bookkeeping for spawned children

/// Kills a child's entire process group when asked or when dropped.
///
/// The child must have been spawned with `process_group(0)` so that its PGID
/// equals its PID. The PID is captured at spawn time because
/// `Child::id()` returns `None` once the child has been reaped.
pub(crate) struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    pub(crate) fn of(child: &tokio::process::Child) -> Self {
        ProcessGroup {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    /// Send SIGKILL to every process in the group. Idempotent.
    pub(crate) fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_process_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // ESRCH just means the group is already gone.
    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: i32) {}
