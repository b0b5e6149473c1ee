//! Configuration management for coderun
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use crate::deps::{InstallPolicy, PolicyMode};
use crate::sandbox::ResourceLimits;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CPU_LIMIT_SECONDS: u64 = 2;
const DEFAULT_MEMORY_LIMIT_MB: u64 = 64;
const DEFAULT_TIMEOUT_SECONDS: u64 = 3;
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Interpreter and package manager settings
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Python interpreter used for parsing, probing and execution
    pub python_bin: String,
    /// Separate package manager binary; `None` installs via `<python_bin> -m pip`
    pub installer_bin: Option<String>,
    /// Directory receiving temporary execution artifacts
    pub scratch_dir: PathBuf,
    /// Upper bound on concurrently running child processes
    pub max_concurrent_executions: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            python_bin: "python3".to_string(),
            installer_bin: None,
            scratch_dir: std::env::temp_dir(),
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Basic auth credentials
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: SecretString,
}

impl AuthConfig {
    /// Check a decoded `user:password` pair
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password.expose_secret() == password
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level filter
    pub level: String,
    /// Log format (pretty, json)
    pub format: String,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ceilings applied to every child process
    pub limits: ResourceLimits,
    /// Interpreter/installer settings
    pub runtime: RuntimeConfig,
    /// Which missing modules may be installed
    pub install: InstallPolicy,
    /// Basic auth; `None` leaves the API open
    pub auth: Option<AuthConfig>,
    /// Logging settings
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cpu_seconds = parse_var(&lookup, "CPU_LIMIT_SECONDS", DEFAULT_CPU_LIMIT_SECONDS)?;
        let memory_mb = parse_var(&lookup, "MEMORY_LIMIT_MB", DEFAULT_MEMORY_LIMIT_MB)?;
        let timeout_secs = parse_var(&lookup, "EXEC_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS)?;
        if timeout_secs == 0 {
            return Err(Error::Config(
                "EXEC_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }
        let memory_bytes = memory_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            Error::Config(format!("MEMORY_LIMIT_MB is too large: {}", memory_mb))
        })?;

        let defaults = RuntimeConfig::default();
        let max_concurrent_executions =
            parse_var(&lookup, "MAX_CONCURRENT_EXECUTIONS", defaults.max_concurrent_executions)?;
        if max_concurrent_executions == 0 {
            return Err(Error::Config(
                "MAX_CONCURRENT_EXECUTIONS must be greater than 0".to_string(),
            ));
        }

        let mode = match lookup("INSTALL_POLICY") {
            Some(value) => value.parse()?,
            None => PolicyMode::default(),
        };

        let auth = match (lookup("BASIC_AUTH_USER"), lookup("BASIC_AUTH_PASS")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AuthConfig {
                    username,
                    password: SecretString::from(password),
                })
            }
            _ => None,
        };

        Ok(Config {
            limits: ResourceLimits::new(
                cpu_seconds,
                memory_bytes,
                Duration::from_secs(timeout_secs),
            ),
            runtime: RuntimeConfig {
                python_bin: lookup("PYTHON_BIN").unwrap_or(defaults.python_bin),
                installer_bin: lookup("INSTALLER_BIN").filter(|bin| !bin.trim().is_empty()),
                scratch_dir: lookup("SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.scratch_dir),
                max_concurrent_executions,
            },
            install: InstallPolicy::new(
                mode,
                split_list(lookup("INSTALL_ALLOWLIST")),
                split_list(lookup("INSTALL_DENYLIST")),
            ),
            auth,
            log: LogConfig {
                level: lookup("RUST_LOG").unwrap_or_else(|| "info,coderun=debug".to_string()),
                format: lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string()),
            },
        })
    }

    /// Create a minimal config for tests: default limits, open API, nothing installable
    pub fn minimal() -> Self {
        Config {
            limits: ResourceLimits::new(
                DEFAULT_CPU_LIMIT_SECONDS,
                DEFAULT_MEMORY_LIMIT_MB * 1024 * 1024,
                Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            ),
            runtime: RuntimeConfig::default(),
            install: InstallPolicy::default(),
            auth: None,
            log: LogConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {:?} ({})", key, raw, e))),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>) -> BTreeSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.limits.cpu_seconds(), 2);
        assert_eq!(config.limits.memory_bytes(), 64 * 1024 * 1024);
        assert_eq!(config.limits.wall_clock_timeout(), Duration::from_secs(3));
        assert_eq!(config.runtime.python_bin, "python3");
        assert_eq!(config.runtime.installer_bin, None);
        assert_eq!(config.install.mode(), PolicyMode::AllowList);
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_memory_is_converted_from_megabytes() {
        let config =
            Config::from_lookup(lookup_from(&[("MEMORY_LIMIT_MB", "128"), ("CPU_LIMIT_SECONDS", "0")]))
                .unwrap();
        assert_eq!(config.limits.memory_bytes(), 128 * 1024 * 1024);
        assert_eq!(config.limits.cpu_seconds(), 0);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("EXEC_TIMEOUT_SECONDS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("CPU_LIMIT_SECONDS", "two")])).unwrap_err();
        assert!(err.to_string().contains("CPU_LIMIT_SECONDS"));
    }

    #[test]
    fn test_auth_requires_both_values() {
        let only_user = Config::from_lookup(lookup_from(&[("BASIC_AUTH_USER", "admin")])).unwrap();
        assert!(only_user.auth.is_none());

        let both = Config::from_lookup(lookup_from(&[
            ("BASIC_AUTH_USER", "admin"),
            ("BASIC_AUTH_PASS", "hunter2"),
        ]))
        .unwrap();
        let auth = both.auth.unwrap();
        assert!(auth.matches("admin", "hunter2"));
        assert!(!auth.matches("admin", "hunter3"));
    }

    #[test]
    fn test_install_lists() {
        let config = Config::from_lookup(lookup_from(&[
            ("INSTALL_POLICY", "open"),
            ("INSTALL_ALLOWLIST", "requests, numpy ,,"),
            ("INSTALL_DENYLIST", "os"),
        ]))
        .unwrap();
        assert_eq!(config.install.mode(), PolicyMode::Open);
        assert!(config.install.permits("requests"));
        assert!(config.install.permits("anything"));
        assert!(!config.install.permits("os"));
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("INSTALL_POLICY", "yolo")])).is_err());
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::minimal();
        assert!(config.auth.is_none());
        assert_eq!(config.runtime.max_concurrent_executions, 8);
    }
}
