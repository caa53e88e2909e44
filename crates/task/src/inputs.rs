//! Input validation
//!
//! Turns the raw, string-keyed inputs into a [`BuildConfiguration`]. The first
//! problem found aborts validation; nothing is executed before it succeeds.

use crate::analysis::{AnalysisSettings, LegacyDatabase};
use crate::command::split_tasks;
use crate::coverage::CoverageTool;
use crate::jdk::{JavaHomeSelection, DEFAULT_JDK_ARCHITECTURE, DEFAULT_JDK_VERSION};
use gradle_ci_core::environment::TaskEnvironment;
use gradle_ci_core::error::{Error, Result};
use gradle_ci_core::fs::FileSystem;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Input names
pub mod names {
    pub const WRAPPER_SCRIPT: &str = "wrapperScript";
    pub const CWD: &str = "cwd";
    pub const OPTIONS: &str = "options";
    pub const TASKS: &str = "tasks";
    pub const JAVA_HOME_SELECTION: &str = "javaHomeSelection";
    pub const JDK_VERSION: &str = "jdkVersion";
    pub const JDK_ARCHITECTURE: &str = "jdkArchitecture";
    pub const JDK_USER_INPUT_PATH: &str = "jdkUserInputPath";
    pub const PUBLISH_JUNIT_RESULTS: &str = "publishJUnitResults";
    pub const TEST_RESULTS_FILES: &str = "testResultsFiles";
    pub const TEST_RUN_TITLE: &str = "testRunTitle";
    pub const CODE_COVERAGE_TOOL: &str = "codeCoverageTool";
    pub const SQ_ANALYSIS_ENABLED: &str = "sqAnalysisEnabled";
    pub const SQ_CONNECTED_SERVICE_NAME: &str = "sqConnectedServiceName";
    pub const SQ_PROJECT_NAME: &str = "sqProjectName";
    pub const SQ_PROJECT_KEY: &str = "sqProjectKey";
    pub const SQ_PROJECT_VERSION: &str = "sqProjectVersion";
    pub const SQ_DB_DETAILS_REQUIRED: &str = "sqDbDetailsRequired";
    pub const SQ_DB_URL: &str = "sqDbUrl";
    pub const SQ_DB_USERNAME: &str = "sqDbUsername";
    pub const SQ_DB_PASSWORD: &str = "sqDbPassword";
}

/// Build variable holding the repository root, the default working directory
pub const SOURCES_DIRECTORY: &str = "build.sourcesDirectory";

/// Validated build settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfiguration {
    pub wrapper_script: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub options: String,
    pub tasks: Vec<String>,
    pub java_home: JavaHomeSelection,
    pub publish_junit_results: bool,
    pub test_results_files: Option<String>,
    pub test_run_title: Option<String>,
    pub coverage_tool: CoverageTool,
    pub analysis: Option<AnalysisSettings>,
}

/// Anything other than a literal `false` leaves the flag on
fn permissive_flag(value: Option<&str>) -> bool {
    !matches!(value, Some(v) if v.eq_ignore_ascii_case("false"))
}

/// Only a literal `true` turns the flag on
fn strict_flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("true"))
}

/// Validates task inputs against the environment and filesystem
pub struct InputValidator<'a> {
    env: &'a dyn TaskEnvironment,
    fs: &'a dyn FileSystem,
}

impl<'a> InputValidator<'a> {
    pub fn new(env: &'a dyn TaskEnvironment, fs: &'a dyn FileSystem) -> Self {
        Self { env, fs }
    }

    fn input(&self, name: &str) -> Option<String> {
        self.env.input(name)
    }

    fn required(&self, name: &str) -> Result<String> {
        self.input(name).ok_or_else(|| Error::missing_input(name))
    }

    fn existing_path(&self, name: &str, value: String) -> Result<PathBuf> {
        let path = PathBuf::from(value);
        if self.fs.exists(&path) {
            Ok(path)
        } else {
            Err(Error::path_not_found(name, &path))
        }
    }

    fn existing_file(&self, name: &str, value: String) -> Result<PathBuf> {
        let path = PathBuf::from(value);
        if self.fs.is_file(&path) {
            Ok(path)
        } else {
            Err(Error::path_not_found(name, &path))
        }
    }

    pub fn validate(&self) -> Result<BuildConfiguration> {
        let wrapper_script = self.required(names::WRAPPER_SCRIPT)?;
        let wrapper_script = self.existing_file(names::WRAPPER_SCRIPT, wrapper_script)?;

        // Without `cwd` the build runs from the repository root, or from the
        // current directory outside an agent.
        let working_dir = match self.input(names::CWD) {
            Some(cwd) => Some(self.existing_path(names::CWD, cwd)?),
            None => self.env.variable(SOURCES_DIRECTORY).map(PathBuf::from),
        };

        let tasks = split_tasks(&self.required(names::TASKS)?);

        let publish_junit_results =
            permissive_flag(self.input(names::PUBLISH_JUNIT_RESULTS).as_deref());
        let test_results_files = if publish_junit_results {
            Some(self.required(names::TEST_RESULTS_FILES)?)
        } else {
            self.input(names::TEST_RESULTS_FILES)
        };

        let java_home = self.java_home()?;
        let coverage_tool = CoverageTool::parse(self.input(names::CODE_COVERAGE_TOOL).as_deref())?;
        let analysis = self.analysis()?;

        let config = BuildConfiguration {
            wrapper_script,
            working_dir,
            options: self.input(names::OPTIONS).unwrap_or_default(),
            tasks,
            java_home,
            publish_junit_results,
            test_results_files,
            test_run_title: self.input(names::TEST_RUN_TITLE),
            coverage_tool,
            analysis,
        };
        debug!(?config, "validated inputs");
        Ok(config)
    }

    fn java_home(&self) -> Result<JavaHomeSelection> {
        let selection = self.required(names::JAVA_HOME_SELECTION)?;

        if selection.eq_ignore_ascii_case("JDKVersion") {
            Ok(JavaHomeSelection::JdkVersion {
                version: self
                    .input(names::JDK_VERSION)
                    .unwrap_or_else(|| DEFAULT_JDK_VERSION.to_string()),
                architecture: self
                    .input(names::JDK_ARCHITECTURE)
                    .unwrap_or_else(|| DEFAULT_JDK_ARCHITECTURE.to_string()),
            })
        } else if selection.eq_ignore_ascii_case("Path") {
            let path = self.required(names::JDK_USER_INPUT_PATH)?;
            Ok(JavaHomeSelection::Path {
                path: self.existing_path(names::JDK_USER_INPUT_PATH, path)?,
            })
        } else {
            Err(Error::invalid_input(names::JAVA_HOME_SELECTION, &selection)
                .with_suggestion("Use JDKVersion or Path"))
        }
    }

    fn analysis(&self) -> Result<Option<AnalysisSettings>> {
        if !strict_flag(self.input(names::SQ_ANALYSIS_ENABLED).as_deref()) {
            return Ok(None);
        }

        let service_name = self.required(names::SQ_CONNECTED_SERVICE_NAME)?;
        let database = strict_flag(self.input(names::SQ_DB_DETAILS_REQUIRED).as_deref()).then(|| {
            LegacyDatabase {
                url: self.input(names::SQ_DB_URL),
                username: self.input(names::SQ_DB_USERNAME),
                password: self.input(names::SQ_DB_PASSWORD),
            }
        });

        Ok(Some(AnalysisSettings {
            service_name,
            project_name: self.input(names::SQ_PROJECT_NAME),
            project_key: self.input(names::SQ_PROJECT_KEY),
            project_version: self.input(names::SQ_PROJECT_VERSION),
            database,
        }))
    }
}
