//! JDK selection
//!
//! Agents advertise installed JDKs through variables named
//! `JAVA_HOME_<major>_<ARCH>`, e.g. `JAVA_HOME_8_X86`. Resolution never touches
//! the task's own environment: the result is an assignment applied to each
//! build invocation.

use gradle_ci_core::environment::TaskEnvironment;
use gradle_ci_core::error::{Error, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Version value meaning "use whatever JDK the agent already has"
pub const DEFAULT_JDK_VERSION: &str = "default";

/// Architecture assumed when none is given
pub const DEFAULT_JDK_ARCHITECTURE: &str = "x64";

/// How JAVA_HOME is chosen for the build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JavaHomeSelection {
    /// Look up an installed JDK by version and architecture
    JdkVersion {
        version: String,
        architecture: String,
    },
    /// Use the JDK at an explicit path
    Path { path: PathBuf },
}

impl Default for JavaHomeSelection {
    fn default() -> Self {
        JavaHomeSelection::JdkVersion {
            version: DEFAULT_JDK_VERSION.to_string(),
            architecture: DEFAULT_JDK_ARCHITECTURE.to_string(),
        }
    }
}

/// An environment variable to set on every build invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvAssignment {
    pub name: String,
    pub value: String,
}

impl EnvAssignment {
    pub fn java_home(value: impl Into<String>) -> Self {
        Self {
            name: "JAVA_HOME".to_string(),
            value: value.into(),
        }
    }
}

/// Name of the agent variable advertising a JDK: `1.8` + `x86` -> `JAVA_HOME_8_X86`
pub fn java_home_variable(version: &str, architecture: &str) -> String {
    let major = version.strip_prefix("1.").unwrap_or(version);
    format!("JAVA_HOME_{}_{}", major, architecture.to_uppercase())
}

/// Resolves a [`JavaHomeSelection`] against the agent's variables
pub struct JdkResolver<'a> {
    env: &'a dyn TaskEnvironment,
}

impl<'a> JdkResolver<'a> {
    pub fn new(env: &'a dyn TaskEnvironment) -> Self {
        Self { env }
    }

    /// `Ok(None)` keeps the ambient toolchain
    pub fn resolve(&self, selection: &JavaHomeSelection) -> Result<Option<EnvAssignment>> {
        match selection {
            JavaHomeSelection::JdkVersion { version, .. } if version == DEFAULT_JDK_VERSION => {
                debug!("using the agent's default JDK");
                Ok(None)
            }
            JavaHomeSelection::JdkVersion {
                version,
                architecture,
            } => {
                let variable = java_home_variable(version, architecture);
                match self.env.variable(&variable) {
                    Some(home) => {
                        debug!(%variable, %home, "resolved JDK");
                        Ok(Some(EnvAssignment::java_home(home)))
                    }
                    None => Err(Error::jdk_not_found(version, architecture, &variable)),
                }
            }
            JavaHomeSelection::Path { path } => Ok(Some(EnvAssignment::java_home(
                path.display().to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEnvironment;
    use gradle_ci_core::error::ErrorCode;

    fn version(version: &str, architecture: &str) -> JavaHomeSelection {
        JavaHomeSelection::JdkVersion {
            version: version.into(),
            architecture: architecture.into(),
        }
    }

    #[test]
    fn test_variable_name() {
        assert_eq!(java_home_variable("1.8", "x86"), "JAVA_HOME_8_X86");
        assert_eq!(java_home_variable("1.7", "x64"), "JAVA_HOME_7_X64");
        assert_eq!(java_home_variable("11", "x64"), "JAVA_HOME_11_X64");
    }

    #[test]
    fn test_default_version_keeps_ambient_jdk() {
        let env = FakeEnvironment::new();
        let resolved = JdkResolver::new(&env)
            .resolve(&JavaHomeSelection::default())
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_known_version_resolves() {
        let env = FakeEnvironment::new().with_variable("JAVA_HOME_8_X86", "/user/local/bin/Java8");
        let resolved = JdkResolver::new(&env).resolve(&version("1.8", "x86")).unwrap();
        assert_eq!(resolved, Some(EnvAssignment::java_home("/user/local/bin/Java8")));
    }

    #[test]
    fn test_unknown_version_fails() {
        let env = FakeEnvironment::new().with_variable("JAVA_HOME_8_X86", "/user/local/bin/Java8");
        let err = JdkResolver::new(&env)
            .resolve(&version("1.5", "x86"))
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::JdkNotFound);
        assert!(err.message.starts_with("Failed to find specified JDK version"));
        assert!(err.message.contains("JAVA_HOME_5_X86"));
    }

    #[test]
    fn test_explicit_path() {
        let env = FakeEnvironment::new();
        let resolved = JdkResolver::new(&env)
            .resolve(&JavaHomeSelection::Path {
                path: "/opt/jdk-17".into(),
            })
            .unwrap();
        assert_eq!(resolved, Some(EnvAssignment::java_home("/opt/jdk-17")));
    }
}
