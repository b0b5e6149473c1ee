//! Install policy: which missing modules may be fetched on behalf of a caller

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How missing modules outside the deny-list are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Only modules on the allow-list are installed
    #[default]
    AllowList,
    /// Anything not denied is installed
    Open,
}

impl std::str::FromStr for PolicyMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allowlist" | "allow-list" | "allow" => Ok(PolicyMode::AllowList),
            "open" | "any" => Ok(PolicyMode::Open),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid install policy: {}. Valid: allowlist, open",
                s
            ))),
        }
    }
}

impl std::fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyMode::AllowList => write!(f, "allowlist"),
            PolicyMode::Open => write!(f, "open"),
        }
    }
}

/// Allow/deny rules consulted before the package manager runs.
///
/// The deny-list always wins. The default policy installs nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPolicy {
    mode: PolicyMode,
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl InstallPolicy {
    pub fn new(mode: PolicyMode, allow: BTreeSet<String>, deny: BTreeSet<String>) -> Self {
        InstallPolicy { mode, allow, deny }
    }

    /// Policy that installs whatever is missing (minus the deny-list)
    pub fn open() -> Self {
        InstallPolicy {
            mode: PolicyMode::Open,
            ..Default::default()
        }
    }

    /// Allow-list policy over the given names
    pub fn allow_only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InstallPolicy {
            mode: PolicyMode::AllowList,
            allow: names.into_iter().map(Into::into).collect(),
            deny: BTreeSet::new(),
        }
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// Whether `module` may be installed
    pub fn permits(&self, module: &str) -> bool {
        if self.deny.contains(module) {
            return false;
        }
        match self.mode {
            PolicyMode::AllowList => self.allow.contains(module),
            PolicyMode::Open => true,
        }
    }

    /// Names from `modules` this policy refuses, in sorted order
    pub fn refused<'a, I>(&self, modules: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        modules
            .into_iter()
            .filter(|m| !self.permits(m))
            .cloned()
            .collect()
    }
}
