//! SonarQube analysis
//!
//! Analysis runs inside the same Gradle invocation through an init script that
//! applies the `sonarqube` plugin. Pull requests built from a hosted Git
//! repository run in issues mode, which produces no server-side report; every
//! other build must leave a report pointer behind that links to the dashboard.

use crate::command::CommandFragment;
use crate::inputs::SOURCES_DIRECTORY;
use gradle_ci_core::environment::{ServiceEndpoint, TaskEnvironment};
use gradle_ci_core::error::{Error, Result};
use gradle_ci_core::fs::FileSystem;
use gradle_ci_core::host::{TaskHost, SUMMARY_ATTACHMENT_TYPE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Name of the build summary section
pub const SUMMARY_NAME: &str = "SonarQube Analysis Report";

/// Summary shown for pull request builds, which have no server report
pub const PULL_REQUEST_SUMMARY: &str =
    "Detailed SonarQube reports are not available for pull request builds.";

const INIT_SCRIPT: &str = "CodeAnalysis/sonar.gradle";
const ISSUES_REPORT: &str = "sonar-report.json";

static PULL_REQUEST_BRANCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^refs/pull/\d+/").expect("valid regex"));

/// Connection details for servers that still need direct database access
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LegacyDatabase {
    pub url: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Analysis inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSettings {
    pub service_name: String,
    pub project_name: Option<String>,
    pub project_key: Option<String>,
    pub project_version: Option<String>,
    pub database: Option<LegacyDatabase>,
}

/// Where the sources come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RepositoryProvider {
    TfsGit,
    TfsVersionControl,
    GitHub,
    ExternalGit,
    Other(String),
    Unknown,
}

impl RepositoryProvider {
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return RepositoryProvider::Unknown;
        };
        match value.to_ascii_lowercase().as_str() {
            "tfsgit" => RepositoryProvider::TfsGit,
            "tfsversioncontrol" => RepositoryProvider::TfsVersionControl,
            "github" => RepositoryProvider::GitHub,
            "git" | "externalgit" => RepositoryProvider::ExternalGit,
            _ => RepositoryProvider::Other(value.to_string()),
        }
    }
}

/// Build facts the analysis step depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisContext {
    pub source_branch: Option<String>,
    pub provider: RepositoryProvider,
    pub is_pull_request: bool,
    pub sources_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl AnalysisContext {
    pub fn new(
        source_branch: Option<String>,
        provider: RepositoryProvider,
        sources_dir: PathBuf,
        staging_dir: PathBuf,
    ) -> Self {
        let is_pull_request = provider == RepositoryProvider::TfsGit
            && source_branch
                .as_deref()
                .is_some_and(|branch| PULL_REQUEST_BRANCH.is_match(branch));
        Self {
            source_branch,
            provider,
            is_pull_request,
            sources_dir,
            staging_dir,
        }
    }

    /// Read the build variables. Unset directories fall back to the current directory.
    pub fn from_variables(env: &dyn TaskEnvironment) -> Self {
        let dir = |name: &str| env.variable(name).map(PathBuf::from).unwrap_or_default();
        Self::new(
            env.variable("build.sourceBranch"),
            RepositoryProvider::parse(env.variable("build.repository.provider").as_deref()),
            dir(SOURCES_DIRECTORY),
            dir("build.artifactStagingDirectory"),
        )
    }

    pub fn report_pointer_path(&self) -> PathBuf {
        self.sources_dir.join("build").join("sonar").join("report-task.txt")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.staging_dir
            .join(".sqAnalysis")
            .join("SonarQubeBuildSummary.md")
    }
}

/// How the analyzer runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisMode {
    /// Results are uploaded to the server
    Normal,
    /// Issues are only reported locally
    Issues,
}

impl AnalysisMode {
    pub fn for_context(context: &AnalysisContext) -> Self {
        if context.is_pull_request {
            AnalysisMode::Issues
        } else {
            AnalysisMode::Normal
        }
    }
}

/// `report-task.txt`, written by the analyzer once the upload succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPointer {
    pub project_key: String,
    pub server_url: String,
    pub dashboard_url: String,
    pub ce_task_id: String,
    pub ce_task_url: Option<String>,
}

/// Undo Java properties escaping
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

impl ReportPointer {
    pub fn parse(content: &str) -> Result<Self> {
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(key.trim().to_string(), unescape(value.trim()));
        }

        let mut required = |key: &str| {
            values
                .remove(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::invalid_analysis_report(format!("missing {}", key)))
        };

        Ok(Self {
            project_key: required("projectKey")?,
            server_url: required("serverUrl")?,
            dashboard_url: required("dashboardUrl")?,
            ce_task_id: required("ceTaskId")?,
            ce_task_url: values.remove("ceTaskUrl"),
        })
    }

    pub fn summary_markdown(&self) -> String {
        format!(
            "[Detailed SonarQube report >]({} \"{} Dashboard\")",
            self.dashboard_url, self.project_key
        )
    }
}

/// What the report step attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnalysisOutcome {
    /// Summary links to the server dashboard
    Linked { dashboard_url: String },
    /// Pull request build without a server report
    NotAvailableForPullRequest,
}

/// Drives analysis for one run
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    settings: AnalysisSettings,
    endpoint: ServiceEndpoint,
    context: AnalysisContext,
    mode: AnalysisMode,
    task_dir: PathBuf,
}

impl AnalysisOrchestrator {
    /// Resolve the endpoint and pick the mode
    pub fn resolve(
        settings: &AnalysisSettings,
        env: &dyn TaskEnvironment,
        task_dir: &Path,
    ) -> Result<Self> {
        let endpoint = env
            .endpoint(&settings.service_name)
            .ok_or_else(|| Error::endpoint_not_found(&settings.service_name))?;
        let context = AnalysisContext::from_variables(env);
        let mode = AnalysisMode::for_context(&context);
        debug!(?mode, pull_request = context.is_pull_request, "analysis mode selected");

        Ok(Self {
            settings: settings.clone(),
            endpoint,
            context,
            mode,
            task_dir: task_dir.to_path_buf(),
        })
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    fn init_script(&self) -> String {
        // Gradle accepts forward slashes on every platform
        format!(
            "{}/{}",
            self.task_dir.display().to_string().trim_end_matches(['/', '\\']),
            INIT_SCRIPT
        )
    }

    /// The `sonarqube` task and its arguments, followed by `coverage_argument`
    pub fn fragment(&self, coverage_argument: Option<String>) -> CommandFragment {
        let mut args = vec![
            "sonarqube".to_string(),
            "-I".to_string(),
            self.init_script(),
            format!("-Dsonar.host.url={}", self.endpoint.url),
        ];
        if let Some(username) = &self.endpoint.username {
            args.push(format!("-Dsonar.login={}", username));
        }
        if let Some(password) = &self.endpoint.password {
            args.push(format!("-Dsonar.password={}", password));
        }

        if let Some(db) = &self.settings.database {
            let jdbc = [
                ("sonar.jdbc.url", &db.url),
                ("sonar.jdbc.username", &db.username),
                ("sonar.jdbc.password", &db.password),
            ];
            for (property, value) in jdbc {
                if let Some(value) = value {
                    args.push(format!("-D{}={}", property, value));
                }
            }
        }

        let project = [
            ("sonar.projectName", &self.settings.project_name),
            ("sonar.projectKey", &self.settings.project_key),
            ("sonar.projectVersion", &self.settings.project_version),
        ];
        for (property, value) in project {
            if let Some(value) = value {
                args.push(format!("-D{}={}", property, value));
            }
        }

        if self.mode == AnalysisMode::Issues {
            args.push("-Dsonar.analysis.mode=issues".to_string());
            args.push(format!("-Dsonar.report.export.path={}", ISSUES_REPORT));
        }

        args.extend(coverage_argument);
        CommandFragment::new().trail_all(args)
    }

    /// Write the build summary from the report pointer and attach it
    #[instrument(skip_all)]
    pub fn publish_report(&self, fs: &dyn FileSystem, host: &dyn TaskHost) -> Result<AnalysisOutcome> {
        let pointer_path = self.context.report_pointer_path();

        let (summary, outcome) = if fs.exists(&pointer_path) {
            let pointer = ReportPointer::parse(&fs.read_to_string(&pointer_path)?)?;
            debug!(task = %pointer.ce_task_id, server = %pointer.server_url, "read analysis report pointer");
            let outcome = AnalysisOutcome::Linked {
                dashboard_url: pointer.dashboard_url.clone(),
            };
            (pointer.summary_markdown(), outcome)
        } else if self.mode == AnalysisMode::Issues {
            info!("no analysis report for pull request build");
            (
                PULL_REQUEST_SUMMARY.to_string(),
                AnalysisOutcome::NotAvailableForPullRequest,
            )
        } else {
            return Err(Error::missing_analysis_report(&pointer_path));
        };

        let summary_path = self.context.summary_path();
        fs.write(&summary_path, &summary)?;
        host.add_attachment(SUMMARY_ATTACHMENT_TYPE, SUMMARY_NAME, &summary_path);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEnvironment, FakeFileSystem, RecordingHost};
    use gradle_ci_core::error::ErrorCode;

    const VALID_REPORT: &str = "projectKey=test\n\
        serverUrl=http://sonarqubeserver:9000\n\
        dashboardUrl=http\\://sonarqubeserver\\:9000/dashboard/index/test\n\
        ceTaskId=AVYd7yM7BXkFQYSyi9k8\n\
        ceTaskUrl=http://sonarqubeserver:9000/api/ce/task?id=AVYd7yM7BXkFQYSyi9k8\n";

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            service_name: "ID1".into(),
            project_name: Some("test_sqProjectName".into()),
            project_key: Some("test_sqProjectKey".into()),
            project_version: Some("test_sqProjectVersion".into()),
            database: None,
        }
    }

    fn env() -> FakeEnvironment {
        FakeEnvironment::new()
            .with_endpoint("ID1", "http://sonarqube/end/point", Some("uname"), Some("pword"))
            .with_variable("build.sourcesDirectory", "/src")
            .with_variable("build.artifactStagingDirectory", "/stage")
    }

    fn pull_request_env() -> FakeEnvironment {
        env()
            .with_variable("build.sourceBranch", "refs/pull/6/master")
            .with_variable("build.repository.provider", "TFSGit")
    }

    fn orchestrator(env: &FakeEnvironment) -> AnalysisOrchestrator {
        AnalysisOrchestrator::resolve(&settings(), env, Path::new("/gradle")).unwrap()
    }

    #[test]
    fn test_pull_request_detection() {
        let context = |branch: &str, provider: &str| {
            AnalysisContext::new(
                Some(branch.into()),
                RepositoryProvider::parse(Some(provider)),
                PathBuf::new(),
                PathBuf::new(),
            )
        };

        assert!(context("refs/pull/6/master", "TFSGit").is_pull_request);
        assert!(!context("refs/pull/6/master", "ExternalGit").is_pull_request);
        assert!(!context("other/6/master", "TfsGit").is_pull_request);
        assert!(!context("refs/heads/master", "TfsGit").is_pull_request);
    }

    #[test]
    fn test_unknown_endpoint() {
        let err = AnalysisOrchestrator::resolve(
            &settings(),
            &FakeEnvironment::new(),
            Path::new("/gradle"),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::EndpointNotFound);
    }

    #[test]
    fn test_normal_mode_arguments() {
        let analysis = orchestrator(&env());
        let fragment = analysis.fragment(None);

        assert_eq!(analysis.mode(), AnalysisMode::Normal);
        assert!(fragment.leading.is_empty());
        assert_eq!(
            fragment.trailing.join(" "),
            "sonarqube -I /gradle/CodeAnalysis/sonar.gradle -Dsonar.host.url=http://sonarqube/end/point -Dsonar.login=uname -Dsonar.password=pword -Dsonar.projectName=test_sqProjectName -Dsonar.projectKey=test_sqProjectKey -Dsonar.projectVersion=test_sqProjectVersion"
        );
    }

    #[test]
    fn test_issues_mode_and_coverage_argument() {
        let analysis = orchestrator(&pull_request_env());
        let fragment = analysis.fragment(Some(
            "-Dsonar.cobertura.reportPath=CCReport43F6D5EF/coverage.xml".into(),
        ));

        assert_eq!(analysis.mode(), AnalysisMode::Issues);
        assert!(fragment.trailing.join(" ").ends_with(
            "-Dsonar.projectVersion=test_sqProjectVersion -Dsonar.analysis.mode=issues -Dsonar.report.export.path=sonar-report.json -Dsonar.cobertura.reportPath=CCReport43F6D5EF/coverage.xml"
        ));
    }

    #[test]
    fn test_legacy_database_arguments() {
        let mut settings = settings();
        settings.database = Some(LegacyDatabase {
            url: Some("jdbc:test:tcp://localhost:8080/sonar".into()),
            username: Some("testDbUsername".into()),
            password: Some("testDbPassword".into()),
        });
        let analysis = AnalysisOrchestrator::resolve(&settings, &env(), Path::new("/gradle")).unwrap();

        assert!(analysis.fragment(None).trailing.join(" ").contains(
            "-Dsonar.password=pword -Dsonar.jdbc.url=jdbc:test:tcp://localhost:8080/sonar -Dsonar.jdbc.username=testDbUsername -Dsonar.jdbc.password=testDbPassword -Dsonar.projectName="
        ));
    }

    #[test]
    fn test_parse_report_pointer() {
        let pointer = ReportPointer::parse(VALID_REPORT).unwrap();
        assert_eq!(pointer.project_key, "test");
        assert_eq!(
            pointer.dashboard_url,
            "http://sonarqubeserver:9000/dashboard/index/test"
        );
        assert_eq!(
            pointer.summary_markdown(),
            "[Detailed SonarQube report >](http://sonarqubeserver:9000/dashboard/index/test \"test Dashboard\")"
        );
    }

    #[test]
    fn test_parse_invalid_report_pointer() {
        let err = ReportPointer::parse("projectKey=test\n# no urls\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAnalysisReport);
    }

    #[test]
    fn test_publish_linked_summary() {
        let analysis = orchestrator(&env());
        let fs = FakeFileSystem::new().with_file("/src/build/sonar/report-task.txt", VALID_REPORT);
        let host = RecordingHost::new();

        let outcome = analysis.publish_report(&fs, &host).unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Linked { .. }));
        let summary = fs
            .contents(Path::new("/stage/.sqAnalysis/SonarQubeBuildSummary.md"))
            .unwrap();
        assert!(summary.contains("\"test Dashboard\""));
        let attachment = host.command_named("task.addattachment").unwrap();
        assert_eq!(attachment.get("type"), Some(SUMMARY_ATTACHMENT_TYPE));
        assert_eq!(attachment.get("name"), Some(SUMMARY_NAME));
    }

    #[test]
    fn test_missing_pointer_in_pull_request_succeeds() {
        let analysis = orchestrator(&pull_request_env());
        let fs = FakeFileSystem::new();
        let host = RecordingHost::new();

        let outcome = analysis.publish_report(&fs, &host).unwrap();

        assert_eq!(outcome, AnalysisOutcome::NotAvailableForPullRequest);
        assert_eq!(
            fs.contents(Path::new("/stage/.sqAnalysis/SonarQubeBuildSummary.md"))
                .as_deref(),
            Some(PULL_REQUEST_SUMMARY)
        );
        assert!(host.command_named("task.addattachment").is_some());
    }

    #[test]
    fn test_missing_pointer_otherwise_fails() {
        let analysis = orchestrator(&env());
        let host = RecordingHost::new();

        let err = analysis.publish_report(&FakeFileSystem::new(), &host).unwrap_err();

        assert_eq!(err.code, ErrorCode::MissingAnalysisReport);
        assert!(host.command_named("task.addattachment").is_none());
    }

    #[test]
    fn test_invalid_pointer_fails_without_attachment() {
        let analysis = orchestrator(&pull_request_env());
        let fs = FakeFileSystem::new().with_file("/src/build/sonar/report-task.txt", "projectKey=test\n");
        let host = RecordingHost::new();

        let err = analysis.publish_report(&fs, &host).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidAnalysisReport);
        assert!(host.command_named("task.addattachment").is_none());
    }
}
