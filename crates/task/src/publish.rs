//! Outcome aggregation and test result publishing

use crate::inputs::BuildConfiguration;
use gradle_ci_core::error::Error;
use gradle_ci_core::fs::FileSystem;
use gradle_ci_core::host::{HostCommand, TaskHost, TaskResult};
use gradle_ci_core::process::{ExecutionResult, Invocation};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Token Gradle prints when a build fails
pub const FAILURE_MARKER: &str = "FAILED";

/// Test report format published to the host
pub const TEST_FRAMEWORK: &str = "JUnit";

/// One finished invocation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub command_line: String,
    pub result: ExecutionResult,
}

/// What happened to test results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TestResults {
    Disabled,
    NoMatches,
    Published(Vec<PathBuf>),
}

/// Collects execution results and reports the final outcome
#[derive(Debug, Default)]
pub struct ResultPublisher {
    records: Vec<ExecutionRecord>,
    result: Option<TaskResult>,
}

impl ResultPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, invocation: &Invocation, result: ExecutionResult) {
        debug!(command = %invocation, exit_code = result.exit_code, "invocation finished");
        self.records.push(ExecutionRecord {
            command_line: invocation.command_line(),
            result,
        });
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    /// First invocation that exited non-zero
    pub fn first_failure(&self) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| !r.result.success())
    }

    fn failure_marker_seen(&self) -> bool {
        self.records
            .last()
            .is_some_and(|r| r.result.combined_output().contains(FAILURE_MARKER))
    }

    /// Warn when the last invocation printed the failure marker. Diagnostic
    /// only; exit codes decide the outcome.
    pub fn log_failure_marker(&self) {
        if self.failure_marker_seen() {
            warn!("build output reports {}", FAILURE_MARKER);
        }
    }

    /// Publish JUnit results matching the configured glob, whatever the build
    /// outcome. Problems here are warnings and never fail the task.
    pub fn publish_test_results(
        &self,
        config: &BuildConfiguration,
        fs: &dyn FileSystem,
        host: &dyn TaskHost,
    ) -> TestResults {
        let pattern = match (&config.test_results_files, config.publish_junit_results) {
            (Some(pattern), true) => pattern,
            _ => return TestResults::Disabled,
        };

        let root = config.working_dir.as_deref().unwrap_or(Path::new(""));
        let files = match fs.find_matching(root, pattern) {
            Ok(files) => files,
            Err(e) => {
                host.warning(&format!(
                    "Unable to search for test result files matching {}: {}",
                    pattern, e.message
                ));
                return TestResults::NoMatches;
            }
        };
        if files.is_empty() {
            host.warning(&format!(
                "No test result files matching {} were found, so publishing {} test results is being skipped.",
                pattern, TEST_FRAMEWORK
            ));
            return TestResults::NoMatches;
        }

        let joined = files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut command = HostCommand::new("results.publish")
            .property("type", TEST_FRAMEWORK)
            .property("mergeResults", "true")
            .property("publishRunAttachments", "true")
            .property("resultFiles", joined);
        if let Some(title) = &config.test_run_title {
            command = command.property("runTitle", title);
        }
        host.command(&command);

        TestResults::Published(files)
    }

    /// Set the task result. Only the first call has any effect.
    pub fn finish(&mut self, host: &dyn TaskHost, error: Option<&Error>) -> TaskResult {
        if let Some(result) = self.result {
            return result;
        }

        let message = error.map(|e| e.message.clone()).or_else(|| {
            self.first_failure()
                .map(|r| Error::tool_failed(&r.command_line, r.result.exit_code).message)
        });

        let result = match message {
            None => {
                host.set_result(TaskResult::Succeeded, "Build succeeded");
                TaskResult::Succeeded
            }
            Some(message) => {
                host.report_error(&message);
                host.set_result(TaskResult::Failed, &message);
                TaskResult::Failed
            }
        };
        self.result = Some(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_configuration, FakeFileSystem, RecordingHost};

    fn publishing() -> BuildConfiguration {
        let mut config = sample_configuration();
        config.test_results_files = Some("**/build/test-results/TEST-*.xml".into());
        config
    }

    #[test]
    fn test_first_failure_and_marker() {
        let mut publisher = ResultPublisher::new();
        publisher.record(&Invocation::new("gradlew").arg("properties"), ExecutionResult::new(0, ""));
        assert!(publisher.first_failure().is_none());
        assert!(!publisher.failure_marker_seen());

        publisher.record(&Invocation::new("gradlew").arg("build"), ExecutionResult::new(1, "BUILD FAILED"));
        assert!(publisher.failure_marker_seen());
        assert_eq!(publisher.first_failure().unwrap().command_line, "gradlew build");
    }

    #[test]
    fn test_failure_marker_on_stderr() {
        let mut publisher = ResultPublisher::new();
        let mut result = ExecutionResult::new(1, "");
        result.stderr = "FAILURE: Build failed with an exception.\nBUILD FAILED".into();
        publisher.record(&Invocation::new("gradlew").arg("build"), result);

        assert!(publisher.failure_marker_seen());
        publisher.log_failure_marker();
    }

    #[test]
    fn test_no_matches_warns() {
        let publisher = ResultPublisher::new();
        let host = RecordingHost::new();

        let outcome = publisher.publish_test_results(&publishing(), &FakeFileSystem::new(), &host);

        assert_eq!(outcome, TestResults::NoMatches);
        assert_eq!(
            host.stdout(),
            vec!["##vso[task.issue type=warning;]No test result files matching **/build/test-results/TEST-*.xml were found, so publishing JUnit test results is being skipped."]
        );
    }

    #[test]
    fn test_matches_publish_once() {
        let publisher = ResultPublisher::new();
        let host = RecordingHost::new();
        let fs = FakeFileSystem::new().with_matches(
            "**/build/test-results/TEST-*.xml",
            &["/user/build/test-results/TEST-a.xml", "/user/build/test-results/TEST-b.xml"],
        );
        let mut config = publishing();
        config.test_run_title = Some("Nightly".into());

        let outcome = publisher.publish_test_results(&config, &fs, &host);

        assert!(matches!(outcome, TestResults::Published(ref files) if files.len() == 2));
        let publishes: Vec<_> = host
            .commands()
            .into_iter()
            .filter(|c| c.name() == "results.publish")
            .collect();
        assert_eq!(publishes.len(), 1);
        assert_eq!(
            publishes[0].to_string(),
            "##vso[results.publish type=JUnit;mergeResults=true;publishRunAttachments=true;resultFiles=/user/build/test-results/TEST-a.xml,/user/build/test-results/TEST-b.xml;runTitle=Nightly;]"
        );
    }

    #[test]
    fn test_disabled_publishes_nothing() {
        let publisher = ResultPublisher::new();
        let host = RecordingHost::new();
        let mut config = publishing();
        config.publish_junit_results = false;

        let outcome = publisher.publish_test_results(&config, &FakeFileSystem::new(), &host);

        assert_eq!(outcome, TestResults::Disabled);
        assert!(host.commands().is_empty());
    }

    #[test]
    fn test_invalid_pattern_warns() {
        let publisher = ResultPublisher::new();
        let host = RecordingHost::new();
        let mut config = publishing();
        config.test_results_files = Some("**/[".into());
        let fs = FakeFileSystem::new().with_invalid_pattern("**/[");

        let outcome = publisher.publish_test_results(&config, &fs, &host);

        assert_eq!(outcome, TestResults::NoMatches);
        assert!(host.stdout_contains(
            "##vso[task.issue type=warning;]Unable to search for test result files matching **/["
        ));
        assert!(host.command_named("results.publish").is_none());
    }

    #[test]
    fn test_result_is_set_once() {
        let mut publisher = ResultPublisher::new();
        let host = RecordingHost::new();

        let error = Error::missing_input("tasks");
        assert_eq!(publisher.finish(&host, Some(&error)), TaskResult::Failed);
        assert_eq!(publisher.finish(&host, None), TaskResult::Failed);

        let completions: Vec<_> = host
            .commands()
            .into_iter()
            .filter(|c| c.name() == "task.complete")
            .collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(host.stderr(), vec!["Input required: tasks"]);
    }

    #[test]
    fn test_failed_invocation_fails_without_explicit_error() {
        let mut publisher = ResultPublisher::new();
        let host = RecordingHost::new();
        publisher.record(&Invocation::new("gradlew").arg("build"), ExecutionResult::new(1, ""));

        assert_eq!(publisher.finish(&host, None), TaskResult::Failed);
        assert!(host.stderr()[0].starts_with("Build failed: gradlew build"));
        assert_eq!(
            host.command_named("task.complete").unwrap().get("result"),
            Some("Failed")
        );
    }
}
