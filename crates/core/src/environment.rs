//! Task inputs, build variables and service endpoints
//!
//! The CI host hands all of these to the task through environment variables:
//!
//! - input `wrapperScript` -> `INPUT_WRAPPERSCRIPT`
//! - variable `build.sourceBranch` -> `BUILD_SOURCEBRANCH`
//! - endpoint `ID1` -> `ENDPOINT_URL_ID1` and `ENDPOINT_AUTH_ID1` (JSON)
//!
//! Anything the environment does not define falls back to the configuration file.

use crate::config::ConfigSchema;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Connection details for an external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Read-only view of everything the host provides to a task run
pub trait TaskEnvironment: Send + Sync {
    /// A task input, trimmed; `None` when unset or blank
    fn input(&self, name: &str) -> Option<String>;

    /// A build or agent variable; `None` when unset or blank
    fn variable(&self, name: &str) -> Option<String>;

    /// A service endpoint by connected service name
    fn endpoint(&self, id: &str) -> Option<ServiceEndpoint>;
}

#[derive(Debug, Deserialize)]
struct EndpointAuth {
    #[serde(default)]
    scheme: String,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

fn input_key(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

fn variable_key(name: &str) -> String {
    name.replace(['.', ' '], "_").to_uppercase()
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Environment backed by a snapshot of host variables plus the configuration file
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    vars: BTreeMap<String, String>,
    config: ConfigSchema,
}

impl HostEnvironment {
    /// Snapshot the current process environment
    pub fn from_process(config: ConfigSchema) -> Self {
        Self::new(std::env::vars().collect(), config)
    }

    pub fn new(vars: BTreeMap<String, String>, config: ConfigSchema) -> Self {
        Self { vars, config }
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .or_else(|| self.vars.get(&key.to_uppercase()))
            .map(String::as_str)
    }

    fn endpoint_from_env(&self, id: &str) -> Option<ServiceEndpoint> {
        let url = self.var(&format!("ENDPOINT_URL_{}", id)).and_then(non_blank)?;

        let auth = self
            .var(&format!("ENDPOINT_AUTH_{}", id))
            .and_then(|raw| match serde_json::from_str::<EndpointAuth>(raw) {
                Ok(auth) => Some(auth),
                Err(e) => {
                    tracing::warn!(endpoint = id, error = %e, "ignoring malformed endpoint authorization");
                    None
                }
            });

        let (username, password) = match auth {
            Some(mut auth) => {
                tracing::debug!(endpoint = id, scheme = %auth.scheme, "endpoint authorization found");
                (
                    auth.parameters.remove("username"),
                    auth.parameters.remove("password"),
                )
            }
            None => (None, None),
        };

        Some(ServiceEndpoint {
            url,
            username,
            password,
        })
    }
}

impl TaskEnvironment for HostEnvironment {
    fn input(&self, name: &str) -> Option<String> {
        match self.var(&input_key(name)) {
            Some(value) => non_blank(value),
            None => self.config.inputs.get(name).and_then(|v| non_blank(v)),
        }
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.var(&variable_key(name))
            .and_then(non_blank)
            .or_else(|| self.config.variables.get(name).and_then(|v| non_blank(v)))
    }

    fn endpoint(&self, id: &str) -> Option<ServiceEndpoint> {
        self.endpoint_from_env(id).or_else(|| {
            self.config.endpoints.get(id).map(|e| ServiceEndpoint {
                url: e.url.clone(),
                username: e.username.clone(),
                password: e.password.clone(),
            })
        })
    }
}
