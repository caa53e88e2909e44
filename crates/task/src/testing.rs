//! In-memory collaborators for orchestrator tests

use crate::coverage::CoverageTool;
use crate::inputs::BuildConfiguration;
use crate::jdk::JavaHomeSelection;
use async_trait::async_trait;
use gradle_ci_core::environment::{ServiceEndpoint, TaskEnvironment};
use gradle_ci_core::error::{Error, Result};
use gradle_ci_core::fs::FileSystem;
use gradle_ci_core::host::{HostCommand, TaskHost};
use gradle_ci_core::process::{ExecutionResult, Invocation, ProcessRunner};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// `gradlew build` with every optional feature off
pub fn sample_configuration() -> BuildConfiguration {
    BuildConfiguration {
        wrapper_script: PathBuf::from("gradlew"),
        working_dir: None,
        options: String::new(),
        tasks: vec!["build".to_string()],
        java_home: JavaHomeSelection::default(),
        publish_junit_results: true,
        test_results_files: None,
        test_run_title: None,
        coverage_tool: CoverageTool::None,
        analysis: None,
    }
}

#[derive(Debug, Default)]
pub struct FakeEnvironment {
    inputs: BTreeMap<String, String>,
    variables: BTreeMap<String, String>,
    endpoints: BTreeMap<String, ServiceEndpoint>,
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, value: &str) -> Self {
        self.inputs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_endpoint(
        mut self,
        id: &str,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Self {
        self.endpoints.insert(
            id.to_string(),
            ServiceEndpoint {
                url: url.to_string(),
                username: username.map(String::from),
                password: password.map(String::from),
            },
        );
        self
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl TaskEnvironment for FakeEnvironment {
    fn input(&self, name: &str) -> Option<String> {
        self.inputs.get(name).and_then(|v| non_blank(v))
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).and_then(|v| non_blank(v))
    }

    fn endpoint(&self, id: &str) -> Option<ServiceEndpoint> {
        self.endpoints.get(id).cloned()
    }
}

/// Filesystem holding files, directories and scripted glob results
#[derive(Debug, Default)]
pub struct FakeFileSystem {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: BTreeSet<PathBuf>,
    matches: BTreeMap<String, Vec<PathBuf>>,
    invalid_patterns: BTreeSet<String>,
}

impl FakeFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), contents.to_string());
        self
    }

    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    pub fn with_matches(mut self, pattern: &str, files: &[&str]) -> Self {
        self.matches.insert(
            pattern.to_string(),
            files.iter().map(PathBuf::from).collect(),
        );
        self
    }

    pub fn with_invalid_pattern(mut self, pattern: &str) -> Self {
        self.invalid_patterns.insert(pattern.to_string());
        self
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

impl FileSystem for FakeFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.dirs.contains(path) || self.is_file(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.contents(path)
            .ok_or_else(|| Error::path_not_found("file", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn find_matching(&self, _root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        if self.invalid_patterns.contains(pattern) {
            return Err(Error::invalid_input("testResultsFiles", pattern));
        }
        Ok(self.matches.get(pattern).cloned().unwrap_or_default())
    }
}

/// Process runner answering from a script keyed by command line
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: BTreeMap<String, ExecutionResult>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, command_line: &str, exit_code: i32, stdout: &str) -> Self {
        self.responses.insert(
            command_line.to_string(),
            ExecutionResult::new(exit_code, stdout),
        );
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(invocation.clone());
        let command_line = invocation.command_line();
        self.responses
            .get(&command_line)
            .cloned()
            .ok_or_else(|| Error::process(format!("unscripted command: {}", command_line)))
    }
}

/// Host recording everything written to it
#[derive(Debug, Default)]
pub struct RecordingHost {
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
    commands: Mutex<Vec<HostCommand>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> Vec<String> {
        self.stdout.lock().unwrap().clone()
    }

    pub fn stderr(&self) -> Vec<String> {
        self.stderr.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn command_named(&self, name: &str) -> Option<HostCommand> {
        self.commands().into_iter().find(|c| c.name() == name)
    }

    pub fn stdout_contains(&self, needle: &str) -> bool {
        self.stdout().iter().any(|line| line.contains(needle))
    }
}

impl TaskHost for RecordingHost {
    fn command(&self, command: &HostCommand) {
        self.stdout.lock().unwrap().push(command.to_string());
        self.commands.lock().unwrap().push(command.clone());
    }

    fn info(&self, message: &str) {
        self.stdout.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.stderr.lock().unwrap().push(message.to_string());
    }
}
