//! CI host logging command protocol
//!
//! The host agent scans the task's stdout for lines of the form
//!
//! ```text
//! ##vso[area.action key=value;key=value;]message
//! ```
//!
//! Property order is preserved exactly as added; downstream tooling matches on it.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;

const PREFIX: &str = "##vso[";

/// One structured logging command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    name: String,
    properties: Vec<(String, String)>,
    message: String,
}

impl HostCommand {
    /// `name` is the `area.action` pair, e.g. `codecoverage.enable`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            message: String::new(),
        }
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Value of the first property named `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        &self.message
    }
}

fn escape_property(value: &str) -> String {
    value
        .replace(';', "%3B")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
        .replace(']', "%5D")
}

fn escape_message(value: &str) -> String {
    value.replace('\r', "%0D").replace('\n', "%0A")
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.name)?;
        if !self.properties.is_empty() {
            f.write_str(" ")?;
            for (key, value) in &self.properties {
                write!(f, "{}={};", key, escape_property(value))?;
            }
        }
        write!(f, "]{}", escape_message(&self.message))
    }
}

/// Final outcome reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskResult {
    Succeeded,
    Failed,
}

impl TaskResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResult::Succeeded => "Succeeded",
            TaskResult::Failed => "Failed",
        }
    }
}

/// Attachment type for build summary sections
pub const SUMMARY_ATTACHMENT_TYPE: &str = "Distributedtask.Core.Summary";

/// The CI host as seen by the task: a structured command channel plus plain
/// output and error streams.
pub trait TaskHost: Send + Sync {
    /// Emit a structured logging command
    fn command(&self, command: &HostCommand);

    /// Write a plain line to the task log
    fn info(&self, message: &str);

    /// Write a line to the error stream
    fn error(&self, message: &str);

    fn warning(&self, message: &str) {
        self.command(
            &HostCommand::new("task.issue")
                .property("type", "warning")
                .message(message),
        );
    }

    /// Report a fatal error: an error issue on the log and the text on stderr
    fn report_error(&self, message: &str) {
        self.command(
            &HostCommand::new("task.issue")
                .property("type", "error")
                .message(message),
        );
        self.error(message);
    }

    fn add_attachment(&self, kind: &str, name: &str, path: &Path) {
        self.command(
            &HostCommand::new("task.addattachment")
                .property("type", kind)
                .property("name", name)
                .message(path.display().to_string()),
        );
    }

    fn set_result(&self, result: TaskResult, message: &str) {
        self.command(
            &HostCommand::new("task.complete")
                .property("result", result.as_str())
                .message(message),
        );
    }
}

/// Host that writes to the process's stdout and stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleHost;

impl ConsoleHost {
    pub fn new() -> Self {
        Self
    }
}

impl TaskHost for ConsoleHost {
    fn command(&self, command: &HostCommand) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", command);
        let _ = out.flush();
    }

    fn info(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", message);
    }

    fn error(&self, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", message);
    }
}
