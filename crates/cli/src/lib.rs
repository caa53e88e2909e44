//! CLI utilities for gradle-ci
//!
//! Provides shared CLI functionality:
//! - Terminal output formatting
//! - Logging initialisation
//!
//! Everything here writes to stderr. Stdout belongs to the CI host, which
//! parses it for logging commands.

#![warn(missing_docs)]

pub mod logging;
pub mod output;
