//! # coderun
//!
//! Run untrusted Python snippets as a service.
//!
//! A request carries source code defining a `run` function plus JSON
//! arguments. The service finds the modules the code imports, installs the
//! missing ones when policy allows, invokes `run(*args)` in a child process
//! bounded by CPU, memory and wall-clock limits, and reports the captured
//! stdout, stderr and exit code.

pub mod config;
pub mod deps;
pub mod error;
pub mod pipeline;
pub mod sandbox;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::CodeRunner;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
