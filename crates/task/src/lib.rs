//! The Gradle build task
//!
//! This crate turns task inputs into Gradle invocations and reports back to
//! the CI host:
//! - Input validation and JDK selection
//! - Command line assembly
//! - Code coverage (JaCoCo, Cobertura)
//! - SonarQube analysis and its build summary
//! - Test result publishing and the final task result

pub mod analysis;
pub mod command;
pub mod coverage;
pub mod inputs;
pub mod jdk;
pub mod publish;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use gradle_ci_core::error::{exit_codes, Result};
pub use inputs::BuildConfiguration;
pub use runner::{BuildPlan, GradleTask, TaskOutcome};
