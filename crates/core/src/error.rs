//! Structured error handling for the build task
//!
//! Every failure carries:
//! - An error code that classifies it (input, path, toolchain, tool, analysis)
//! - A human-readable message suitable for the CI log
//! - Optional context and recovery suggestion
//! - A serializable report form

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // General errors (1xxx)
    Unknown = 1000,
    Internal = 1001,

    // IO errors (2xxx)
    IoError = 2000,
    PathNotFound = 2001,
    PermissionDenied = 2002,

    // Configuration errors (3xxx)
    ConfigError = 3000,
    ConfigParseError = 3002,

    // Input errors (4xxx)
    MissingInput = 4000,
    InvalidInput = 4001,
    EndpointNotFound = 4002,

    // Toolchain and process errors (5xxx)
    ProcessError = 5000,
    ToolExecutionFailure = 5001,
    JdkNotFound = 5002,

    // Analysis errors (6xxx)
    MissingAnalysisReport = 6000,
    InvalidAnalysisReport = 6001,
}

impl ErrorCode {
    /// Get the numeric code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            4 => "Input",
            5 => "Process",
            6 => "Analysis",
            _ => "Unknown",
        }
    }

    /// Whether this error is raised before any build tool invocation
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            ErrorCode::MissingInput
                | ErrorCode::InvalidInput
                | ErrorCode::EndpointNotFound
                | ErrorCode::PathNotFound
                | ErrorCode::JdkNotFound
                | ErrorCode::ConfigError
                | ErrorCode::ConfigParseError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {}", ctx)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            source: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Convert to a serializable report
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            code_str: self.code.to_string(),
            category: self.code.category().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
            suggestion: self.suggestion.clone(),
            source: self.source.as_ref().map(|e| e.to_string()),
        }
    }

    // Convenience constructors

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessError, message)
    }

    pub fn missing_input(name: &str) -> Self {
        Self::new(ErrorCode::MissingInput, format!("Input required: {}", name))
    }

    pub fn invalid_input(name: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("Invalid value for input {}: {}", name, value),
        )
    }

    pub fn path_not_found(name: &str, path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::PathNotFound,
            format!("not found {}: {}", name, path.as_ref().display()),
        )
        .with_suggestion("Check that the path exists relative to the repository root")
    }

    pub fn endpoint_not_found(id: &str) -> Self {
        Self::new(
            ErrorCode::EndpointNotFound,
            format!("Service endpoint not found: {}", id),
        )
        .with_suggestion("Check the connected service name or the [endpoints] table")
    }

    pub fn jdk_not_found(version: &str, architecture: &str, variable: &str) -> Self {
        Self::new(
            ErrorCode::JdkNotFound,
            format!(
                "Failed to find specified JDK version. Please make sure environment variable '{}' exists and is set to the location of a corresponding JDK.",
                variable
            ),
        )
        .with_context(format!("Requested JDK {} ({})", version, architecture))
    }

    pub fn tool_failed(program: &str, exit_code: i32) -> Self {
        Self::new(
            ErrorCode::ToolExecutionFailure,
            format!("Build failed: {} exited with code {}", program, exit_code),
        )
    }

    pub fn missing_analysis_report(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::MissingAnalysisReport,
            format!(
                "Could not find the SonarQube task report at {}",
                path.as_ref().display()
            ),
        )
        .with_suggestion("Make sure the sonarqube task ran as part of the build")
    }

    pub fn invalid_analysis_report(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidAnalysisReport,
            format!("Invalid or missing task report: {}", reason.into()),
        )
    }
}

/// Serializable error report for logging and JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub code_str: String,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 3;
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::PathNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("JSON parse error: {}", err))
            .with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {}", err))
            .with_source(err)
    }
}
