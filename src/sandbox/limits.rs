//! Resource ceilings for child processes
//!
//! CPU time and address space are enforced with `setrlimit` in the child
//! between fork and exec. Which ceilings the host can enforce is decided once,
//! at startup, by [`ResourceLimits::enforceable_on_host`].

use std::time::Duration;
use tracing::{info, warn};

/// CPU, memory and wall-clock bounds applied to each execution.
///
/// A zero CPU or memory value disables that ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    cpu_seconds: u64,
    memory_bytes: u64,
    wall_clock_timeout: Duration,
}

impl ResourceLimits {
    pub fn new(cpu_seconds: u64, memory_bytes: u64, wall_clock_timeout: Duration) -> Self {
        ResourceLimits {
            cpu_seconds,
            memory_bytes,
            wall_clock_timeout,
        }
    }

    pub fn cpu_seconds(&self) -> u64 {
        self.cpu_seconds
    }

    pub fn memory_bytes(&self) -> u64 {
        self.memory_bytes
    }

    pub fn wall_clock_timeout(&self) -> Duration {
        self.wall_clock_timeout
    }

    /// Drop the ceilings this host cannot enforce and clamp the rest to the
    /// service's own hard limits, logging each decision once.
    pub fn enforceable_on_host(self) -> Self {
        let mut limits = self;

        if limits.cpu_seconds > 0 {
            limits.cpu_seconds = clamp_to_hard_limit(Ceiling::Cpu, limits.cpu_seconds);
            info!("RLIMIT_CPU set to {}s", limits.cpu_seconds);
        } else {
            info!("RLIMIT_CPU disabled (value=0)");
        }

        if limits.memory_bytes == 0 {
            info!("RLIMIT_AS disabled (value=0)");
        } else if !supports_address_space_limit() {
            warn!("RLIMIT_AS is not supported on this platform, skipping memory limit");
            limits.memory_bytes = 0;
        } else {
            limits.memory_bytes = clamp_to_hard_limit(Ceiling::AddressSpace, limits.memory_bytes);
            info!("RLIMIT_AS set to {} MB", limits.memory_bytes / (1024 * 1024));
        }

        limits
    }

    /// Apply the ceilings to the calling process.
    ///
    /// Runs in the forked child before exec: no allocation, no locks, no logging.
    #[cfg(unix)]
    pub(crate) fn apply_to_current_process(&self) -> std::io::Result<()> {
        use nix::libc::rlim_t;
        use nix::sys::resource::{setrlimit, Resource};

        if self.cpu_seconds > 0 {
            let cpu = self.cpu_seconds as rlim_t;
            setrlimit(Resource::RLIMIT_CPU, cpu, cpu)?;
        }

        #[cfg(any(target_os = "linux", target_os = "android"))]
        if self.memory_bytes > 0 {
            let bytes = self.memory_bytes as rlim_t;
            setrlimit(Resource::RLIMIT_AS, bytes, bytes)?;
        }

        Ok(())
    }
}

/// Whether an address-space ceiling can be placed on a child process
pub const fn supports_address_space_limit() -> bool {
    cfg!(any(target_os = "linux", target_os = "android"))
}

#[derive(Debug, Clone, Copy)]
enum Ceiling {
    Cpu,
    AddressSpace,
}

/// An unprivileged process cannot raise a hard limit, so asking for more than
/// the current hard limit would make every spawn fail.
#[cfg(unix)]
fn clamp_to_hard_limit(ceiling: Ceiling, requested: u64) -> u64 {
    use nix::libc::RLIM_INFINITY;
    use nix::sys::resource::{getrlimit, Resource};

    let resource = match ceiling {
        Ceiling::Cpu => Resource::RLIMIT_CPU,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        Ceiling::AddressSpace => Resource::RLIMIT_AS,
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        Ceiling::AddressSpace => return requested,
    };

    match getrlimit(resource) {
        Ok((_, hard)) if hard != RLIM_INFINITY && (hard as u64) < requested => {
            warn!(
                "{:?} limit {} exceeds the service hard limit {}, clamping",
                ceiling, requested, hard
            );
            hard as u64
        }
        Ok(_) => requested,
        Err(e) => {
            warn!("getrlimit({:?}) failed: {}", ceiling, e);
            requested
        }
    }
}

#[cfg(not(unix))]
fn clamp_to_hard_limit(_ceiling: Ceiling, requested: u64) -> u64 {
    requested
}
