//! Core services for the gradle-ci build task
//!
//! This crate provides the collaborators the task orchestrator is written against:
//!
//! - **Error handling**: structured errors with codes, context, and recovery suggestions
//! - **Process execution**: async command execution with live output and capture
//! - **Filesystem**: existence checks, report reading, summary writing, glob expansion
//! - **Host protocol**: `##vso[...]` logging commands understood by the CI agent
//! - **Environment**: task inputs, build variables and service endpoints
//! - **Configuration**: TOML-based defaults for local runs
//!
//! # Example
//!
//! ```rust,no_run
//! use gradle_ci_core::host::{ConsoleHost, HostCommand, TaskHost};
//!
//! let host = ConsoleHost::new();
//! host.command(
//!     &HostCommand::new("task.issue")
//!         .property("type", "warning")
//!         .message("No test result files were found"),
//! );
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod environment;
pub mod error;
pub mod fs;
pub mod host;
pub mod process;

pub use error::{Error, ErrorCode, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::environment::{HostEnvironment, ServiceEndpoint, TaskEnvironment};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result};
    pub use crate::fs::{FileSystem, LocalFileSystem};
    pub use crate::host::{ConsoleHost, HostCommand, TaskHost, TaskResult};
    pub use crate::process::{ExecutionResult, Invocation, ProcessRunner, TokioProcessRunner};
}
