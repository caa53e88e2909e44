//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub task: TaskConfig,

    /// Task inputs keyed by input name (`wrapperScript`, `tasks`, ...)
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Build variables keyed by variable name (`build.sourceBranch`, ...)
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Service endpoints keyed by connected service name
    #[serde(default)]
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

/// Runtime settings for the task itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Directory holding the task's bundled files (`CodeAnalysis/sonar.gradle`)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Echo build output live while capturing it
    #[serde(default = "default_true")]
    pub echo_output: bool,

    /// Kill a build invocation after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            directory: None,
            echo_output: true,
            timeout_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A service endpoint definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}
