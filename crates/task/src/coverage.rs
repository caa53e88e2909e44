//! Code coverage instrumentation
//!
//! With a coverage tool selected the run has two phases: a `properties` probe
//! to learn whether the project has subprojects, then the real build with
//! `clean` in front and the tool's report task behind the user's tasks.
//!
//! ```text
//! Disabled
//! Pending --(summary exists)--> Published
//!         --(summary absent)--> Unpublished
//! ```

use crate::command::{base_invocation, CommandFragment};
use crate::inputs::BuildConfiguration;
use crate::jdk::EnvAssignment;
use gradle_ci_core::error::{Error, Result};
use gradle_ci_core::fs::FileSystem;
use gradle_ci_core::host::{HostCommand, TaskHost};
use gradle_ci_core::process::{ExecutionResult, Invocation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory the coverage reports are generated into, relative to the working directory
pub const REPORT_DIRECTORY: &str = "CCReport43F6D5EF";

/// Build file instrumented by the host
pub const BUILD_FILE: &str = "build.gradle";

/// Build tool identity reported to the host
pub const BUILD_TOOL: &str = "Gradle";

/// Task used to probe project topology
pub const PROBE_TASK: &str = "properties";

static SUBPROJECTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^subprojects: (.*)$").expect("valid regex"));

/// Supported coverage tools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CoverageTool {
    #[default]
    None,
    JaCoCo,
    Cobertura,
}

impl CoverageTool {
    /// Parse the `codeCoverageTool` input; absent means `None`
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(CoverageTool::None);
        };
        match value.to_ascii_lowercase().as_str() {
            "none" => Ok(CoverageTool::None),
            "jacoco" => Ok(CoverageTool::JaCoCo),
            "cobertura" => Ok(CoverageTool::Cobertura),
            _ => Err(Error::invalid_input("codeCoverageTool", value)
                .with_suggestion("Use one of: None, JaCoCo, Cobertura")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageTool::None => "None",
            CoverageTool::JaCoCo => "JaCoCo",
            CoverageTool::Cobertura => "Cobertura",
        }
    }

    /// Summary file the report task writes into [`REPORT_DIRECTORY`]
    pub fn summary_file(&self) -> Option<&'static str> {
        match self {
            CoverageTool::None => None,
            CoverageTool::JaCoCo => Some("summary.xml"),
            CoverageTool::Cobertura => Some("coverage.xml"),
        }
    }

    /// Gradle task producing the report
    pub fn report_task(&self, topology: ModuleTopology) -> Option<&'static str> {
        match (self, topology) {
            (CoverageTool::None, _) => None,
            (CoverageTool::JaCoCo, ModuleTopology::SingleModule) => Some("jacocoTestReport"),
            (CoverageTool::JaCoCo, ModuleTopology::MultiModule) => Some("jacocoRootReport"),
            (CoverageTool::Cobertura, _) => Some("cobertura"),
        }
    }

    /// Analysis property pointing the analyzer at this tool's report
    pub fn analysis_property(&self) -> Option<&'static str> {
        match self {
            CoverageTool::Cobertura => Some("sonar.cobertura.reportPath"),
            CoverageTool::None | CoverageTool::JaCoCo => None,
        }
    }
}

impl fmt::Display for CoverageTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the build has subprojects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ModuleTopology {
    #[default]
    SingleModule,
    MultiModule,
}

impl ModuleTopology {
    /// Read the `subprojects: [...]` line of `gradle properties` output.
    /// Anything but an empty list is multi-module; no line at all is single-module.
    pub fn from_properties_output(stdout: &str) -> Self {
        match SUBPROJECTS.captures(stdout) {
            Some(caps) if caps[1].trim() != "[]" => ModuleTopology::MultiModule,
            _ => ModuleTopology::SingleModule,
        }
    }

    pub fn is_multi_module(&self) -> bool {
        matches!(self, ModuleTopology::MultiModule)
    }
}

/// Lifecycle of coverage for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverageState {
    Disabled,
    Pending,
    Published,
    Unpublished,
}

/// Drives coverage for one run
#[derive(Debug, Clone)]
pub struct CoverageOrchestrator {
    tool: CoverageTool,
    working_dir: Option<PathBuf>,
    topology: ModuleTopology,
    state: CoverageState,
}

impl CoverageOrchestrator {
    pub fn new(tool: CoverageTool, working_dir: Option<&Path>) -> Self {
        let state = match tool {
            CoverageTool::None => CoverageState::Disabled,
            _ => CoverageState::Pending,
        };
        Self {
            tool,
            working_dir: working_dir.map(Path::to_path_buf),
            topology: ModuleTopology::default(),
            state,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state != CoverageState::Disabled
    }

    fn relative(&self, name: &str) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn report_directory(&self) -> PathBuf {
        self.relative(REPORT_DIRECTORY)
    }

    pub fn summary_path(&self) -> Option<PathBuf> {
        self.tool
            .summary_file()
            .map(|file| self.report_directory().join(file))
    }

    /// The topology probe, or `None` when coverage is disabled
    pub fn probe_invocation(
        &self,
        config: &BuildConfiguration,
        java_home: Option<&EnvAssignment>,
    ) -> Option<Invocation> {
        self.is_enabled()
            .then(|| base_invocation(config, java_home).arg(PROBE_TASK))
    }

    pub fn record_topology(&mut self, probe: &ExecutionResult) {
        self.topology = ModuleTopology::from_properties_output(&probe.stdout);
        debug!(topology = ?self.topology, "detected project topology");
    }

    /// `clean` before the user's tasks and the report task after them
    pub fn fragment(&self) -> Option<CommandFragment> {
        let task = self.tool.report_task(self.topology)?;
        Some(CommandFragment::new().lead("clean").trail(task))
    }

    /// Analysis argument for this tool's report, with a forward-slash path
    pub fn analysis_argument(&self) -> Option<String> {
        let property = self.tool.analysis_property()?;
        let summary = self.tool.summary_file()?;
        Some(format!("-D{}={}/{}", property, REPORT_DIRECTORY, summary))
    }

    /// Tell the host to instrument the build. Emitted once the tool is known,
    /// independent of how the build later turns out.
    pub fn enable(&self, host: &dyn TaskHost) {
        let Some(summary) = self.tool.summary_file() else {
            return;
        };

        host.command(
            &HostCommand::new("codecoverage.enable")
                .property("buildfile", self.relative(BUILD_FILE).display().to_string())
                .property("summaryfile", summary)
                .property("reportdirectory", self.report_directory().display().to_string())
                .property("ismultimodule", self.topology.is_multi_module().to_string())
                .property("buildtool", BUILD_TOOL)
                .property("codecoveragetool", self.tool.as_str()),
        );
    }

    /// Publish the summary if the build produced one. A missing summary is an
    /// expected outcome of a failed or partial build, not an error.
    pub fn publish(&mut self, fs: &dyn FileSystem, host: &dyn TaskHost) -> CoverageState {
        if self.state != CoverageState::Pending {
            return self.state;
        }
        let Some(summary) = self.summary_path() else {
            return self.state;
        };

        self.state = if fs.exists(&summary) {
            host.command(
                &HostCommand::new("codecoverage.publish")
                    .property("codecoveragetool", self.tool.as_str())
                    .property("summaryfile", summary.display().to_string())
                    .property("reportdirectory", self.report_directory().display().to_string()),
            );
            CoverageState::Published
        } else {
            info!(summary = %summary.display(), "coverage summary not found, skipping publish");
            CoverageState::Unpublished
        };

        self.state
    }
}
