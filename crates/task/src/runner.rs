//! Task orchestration
//!
//! One run, in order:
//!
//! 1. validate inputs, resolve the JDK and the analysis endpoint
//! 2. probe project topology (coverage only)
//! 3. run the build
//! 4. publish test results and coverage, whatever the build outcome
//! 5. attach the analysis report (successful builds only)
//! 6. set the task result, exactly once
//!
//! Nothing is executed if step 1 fails.

use crate::analysis::{AnalysisOrchestrator, AnalysisOutcome};
use crate::command::CommandLineBuilder;
use crate::coverage::{CoverageOrchestrator, CoverageState};
use crate::inputs::{BuildConfiguration, InputValidator};
use crate::jdk::{EnvAssignment, JdkResolver};
use crate::publish::{ExecutionRecord, ResultPublisher, TestResults};
use gradle_ci_core::environment::TaskEnvironment;
use gradle_ci_core::error::{Error, Result};
use gradle_ci_core::fs::FileSystem;
use gradle_ci_core::host::{TaskHost, TaskResult};
use gradle_ci_core::process::{ExecutionResult, Invocation, ProcessRunner};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Everything resolved before the first invocation
#[derive(Debug, Clone)]
pub struct PreparedBuild {
    pub configuration: BuildConfiguration,
    pub java_home: Option<EnvAssignment>,
    pub coverage: CoverageOrchestrator,
    pub analysis: Option<AnalysisOrchestrator>,
}

impl PreparedBuild {
    pub fn probe_invocation(&self) -> Option<Invocation> {
        self.coverage
            .probe_invocation(&self.configuration, self.java_home.as_ref())
    }

    /// The build invocation for the topology recorded so far
    pub fn build_invocation(&self) -> Invocation {
        let analysis = self
            .analysis
            .as_ref()
            .map(|a| a.fragment(self.coverage.analysis_argument()));

        CommandLineBuilder::new(&self.configuration)
            .java_home(self.java_home.clone())
            .coverage(self.coverage.fragment())
            .analysis(analysis)
            .build()
    }

    /// Serializable view for `gradle-ci check`
    pub fn plan(&self) -> BuildPlan {
        BuildPlan {
            configuration: self.configuration.clone(),
            java_home: self.java_home.clone(),
            analysis_mode: self.analysis.as_ref().map(|a| format!("{:?}", a.mode())),
            probe: self.probe_invocation().map(|i| i.command_line()),
            build: self.build_invocation().command_line(),
        }
    }
}

/// The command lines a run would execute
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    pub configuration: BuildConfiguration,
    pub java_home: Option<EnvAssignment>,
    pub analysis_mode: Option<String>,
    pub probe: Option<String>,
    pub build: String,
}

/// Result of one run
#[derive(Debug, Serialize)]
pub struct TaskOutcome {
    pub result: TaskResult,
    pub error: Option<String>,
    pub invocations: Vec<ExecutionRecord>,
    pub coverage: Option<CoverageState>,
    pub test_results: Option<TestResults>,
    pub analysis: Option<AnalysisOutcome>,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.result == TaskResult::Succeeded
    }
}

#[derive(Debug, Default)]
struct Progress {
    coverage: Option<CoverageState>,
    test_results: Option<TestResults>,
    analysis: Option<AnalysisOutcome>,
}

/// The Gradle build task, wired to its collaborators
pub struct GradleTask<'a> {
    env: &'a dyn TaskEnvironment,
    fs: &'a dyn FileSystem,
    runner: &'a dyn ProcessRunner,
    host: &'a dyn TaskHost,
    task_dir: PathBuf,
}

impl<'a> GradleTask<'a> {
    pub fn new(
        env: &'a dyn TaskEnvironment,
        fs: &'a dyn FileSystem,
        runner: &'a dyn ProcessRunner,
        host: &'a dyn TaskHost,
        task_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            env,
            fs,
            runner,
            host,
            task_dir: task_dir.into(),
        }
    }

    /// Validate inputs and resolve everything the build needs. Runs nothing.
    pub fn prepare(&self) -> Result<PreparedBuild> {
        let configuration = InputValidator::new(self.env, self.fs).validate()?;

        let java_home = JdkResolver::new(self.env).resolve(&configuration.java_home)?;
        if let Some(assignment) = &java_home {
            self.host
                .info(&format!("Set {} to {}", assignment.name, assignment.value));
        }

        let analysis = configuration
            .analysis
            .as_ref()
            .map(|settings| AnalysisOrchestrator::resolve(settings, self.env, &self.task_dir))
            .transpose()?;

        let coverage = CoverageOrchestrator::new(
            configuration.coverage_tool,
            configuration.working_dir.as_deref(),
        );

        Ok(PreparedBuild {
            configuration,
            java_home,
            coverage,
            analysis,
        })
    }

    /// Run the task and set its result
    #[instrument(skip(self), fields(task_dir = %self.task_dir.display()))]
    pub async fn run(&self) -> TaskOutcome {
        let mut publisher = ResultPublisher::new();
        let mut progress = Progress::default();

        let error = self.execute(&mut publisher, &mut progress).await.err();
        let result = publisher.finish(self.host, error.as_ref());
        info!(result = result.as_str(), "task finished");

        TaskOutcome {
            result,
            error: error.map(|e| e.to_string()),
            invocations: publisher.records().to_vec(),
            coverage: progress.coverage,
            test_results: progress.test_results,
            analysis: progress.analysis,
        }
    }

    async fn invoke(
        &self,
        invocation: &Invocation,
        publisher: &mut ResultPublisher,
    ) -> Result<ExecutionResult> {
        self.host.info(&format!("[command]{}", invocation));
        let result = self.runner.run(invocation).await?;
        publisher.record(invocation, result.clone());
        Ok(result)
    }

    async fn execute(&self, publisher: &mut ResultPublisher, progress: &mut Progress) -> Result<()> {
        let mut prepared = self.prepare()?;

        // A failed probe leaves the single-module default in place; coverage is
        // still enabled before the task fails.
        let probe_failure = match prepared.probe_invocation() {
            Some(probe) => match self.invoke(&probe, publisher).await {
                Ok(result) if result.success() => {
                    prepared.coverage.record_topology(&result);
                    None
                }
                Ok(result) => Some(Error::tool_failed(&probe.command_line(), result.exit_code)),
                Err(e) => Some(e),
            },
            None => None,
        };
        prepared.coverage.enable(self.host);
        if let Some(error) = probe_failure {
            return Err(error);
        }

        let build = prepared.build_invocation();
        let result = self.invoke(&build, publisher).await?;
        publisher.log_failure_marker();

        progress.test_results = Some(publisher.publish_test_results(
            &prepared.configuration,
            self.fs,
            self.host,
        ));
        if prepared.coverage.is_enabled() {
            progress.coverage = Some(prepared.coverage.publish(self.fs, self.host));
        }

        if !result.success() {
            return Err(Error::tool_failed(&build.command_line(), result.exit_code));
        }

        if let Some(analysis) = &prepared.analysis {
            progress.analysis = Some(analysis.publish_report(self.fs, self.host)?);
        }

        Ok(())
    }
}
