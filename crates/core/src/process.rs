//! Process execution utilities
//!
//! Provides a unified interface for running external commands with:
//! - Output capture
//! - Directory context
//! - Environment variables
//! - Streaming output (echoed live while captured)

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument};

/// A fully built command line, ready to be executed.
///
/// Immutable once built; runners consume it by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Invocation {
    /// Start an invocation of `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments, preserving order
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in the given directory instead of the current one
    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.working_dir = dir.map(Path::to_path_buf);
        self
    }

    /// Set an environment variable for the child process
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    /// The command line as it appears in logs: program then arguments, space separated
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Result of a command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Exit code of the command (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl ExecutionResult {
    /// A result with the given exit code and stdout, and empty stderr
    pub fn new(exit_code: i32, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr)
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes invocations of external tools.
///
/// Implementations must run one invocation at a time to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult>;
}

/// Runs invocations as child processes on the tokio runtime
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    echo: bool,
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo the child's output line by line while capturing it
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Kill the child if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn drain<R: AsyncRead + Unpin>(reader: R, echo: Option<Stream>) -> std::io::Result<String> {
    let mut segments = BufReader::new(reader).split(b'\n');
    let mut captured = String::new();

    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        let line = line.trim_end_matches('\r');
        match echo {
            Some(Stream::Stdout) => println!("{}", line),
            Some(Stream::Stderr) => eprintln!("{}", line),
            None => {}
        }
        captured.push_str(line);
        captured.push('\n');
    }

    Ok(captured)
}

/// Relative programs are resolved against the working directory so that a
/// bare `gradlew` never falls through to a PATH lookup.
fn resolve_program(invocation: &Invocation) -> PathBuf {
    let program = invocation.program();
    if program.is_absolute() {
        return program.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(program),
        Err(_) => program.to_path_buf(),
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    #[instrument(skip(self, invocation), fields(command = %invocation))]
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        let program = resolve_program(invocation);

        let mut cmd = Command::new(&program);
        cmd.args(invocation.arguments())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = invocation.working_dir() {
            cmd.current_dir(dir);
        }
        for (key, value) in invocation.environment() {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::process(format!("Failed to execute {}: {}", program.display(), e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::process("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::process("child stderr was not captured"))?;

        let (out_echo, err_echo) = if self.echo {
            (Some(Stream::Stdout), Some(Stream::Stderr))
        } else {
            (None, None)
        };

        let completion = async {
            tokio::join!(
                drain(stdout, out_echo),
                drain(stderr, err_echo),
                child.wait()
            )
        };

        let (stdout, stderr, status) = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.map_err(|_| {
                Error::process(format!(
                    "{} timed out after {}s",
                    program.display(),
                    limit.as_secs()
                ))
            })?,
            None => completion.await,
        };

        let status = status?;
        let result = ExecutionResult {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout?,
            stderr: stderr?,
        };

        debug!(exit_code = result.exit_code, "process finished");
        Ok(result)
    }
}
