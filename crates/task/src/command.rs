//! Gradle wrapper command lines
//!
//! The invocation is assembled from fragments in a fixed order:
//!
//! ```text
//! <wrapper> <options...> <coverage pre-tasks> <tasks...> <coverage tasks> <analysis tasks and args>
//! ```
//!
//! Optional features never splice into each other; each contributes one
//! [`CommandFragment`] into its own slot.

use crate::inputs::BuildConfiguration;
use crate::jdk::EnvAssignment;
use gradle_ci_core::process::Invocation;

/// Split a free-form options string into arguments.
///
/// Whitespace separates arguments outside double quotes. Quotes group and are
/// stripped; inside quotes `\"` produces a literal quote.
pub fn tokenize_options(options: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut started = false;

    for c in options.chars() {
        if escaped {
            if c != '"' {
                current.push('\\');
            }
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' if in_quotes => escaped = true,
            '"' => {
                in_quotes = !in_quotes;
                started = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }

    if escaped {
        current.push('\\');
    }
    if started {
        tokens.push(current);
    }

    tokens
}

/// Split the tasks input on whitespace, preserving order
pub fn split_tasks(tasks: &str) -> Vec<String> {
    tasks.split_whitespace().map(String::from).collect()
}

/// Tasks and arguments contributed by one optional feature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandFragment {
    /// Inserted before the user's tasks
    pub leading: Vec<String>,
    /// Appended after the user's tasks
    pub trailing: Vec<String>,
}

impl CommandFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lead(mut self, token: impl Into<String>) -> Self {
        self.leading.push(token.into());
        self
    }

    pub fn trail(mut self, token: impl Into<String>) -> Self {
        self.trailing.push(token.into());
        self
    }

    pub fn trail_all<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trailing.extend(tokens.into_iter().map(Into::into));
        self
    }
}

/// Builds the build invocation for a validated configuration
#[derive(Debug, Clone)]
pub struct CommandLineBuilder<'a> {
    config: &'a BuildConfiguration,
    java_home: Option<EnvAssignment>,
    coverage: Option<CommandFragment>,
    analysis: Option<CommandFragment>,
}

impl<'a> CommandLineBuilder<'a> {
    pub fn new(config: &'a BuildConfiguration) -> Self {
        Self {
            config,
            java_home: None,
            coverage: None,
            analysis: None,
        }
    }

    pub fn java_home(mut self, assignment: Option<EnvAssignment>) -> Self {
        self.java_home = assignment;
        self
    }

    pub fn coverage(mut self, fragment: Option<CommandFragment>) -> Self {
        self.coverage = fragment;
        self
    }

    pub fn analysis(mut self, fragment: Option<CommandFragment>) -> Self {
        self.analysis = fragment;
        self
    }

    /// Assemble the invocation. Slot order is fixed regardless of call order.
    pub fn build(self) -> Invocation {
        let fragments: Vec<&CommandFragment> =
            [self.coverage.as_ref(), self.analysis.as_ref()]
                .into_iter()
                .flatten()
                .collect();

        base_invocation(self.config, self.java_home.as_ref())
            .args(tokenize_options(&self.config.options))
            .args(fragments.iter().flat_map(|f| f.leading.iter().cloned()))
            .args(self.config.tasks.iter().cloned())
            .args(fragments.iter().flat_map(|f| f.trailing.iter().cloned()))
    }
}

/// The wrapper script in the configured working directory, with JAVA_HOME applied
pub fn base_invocation(config: &BuildConfiguration, java_home: Option<&EnvAssignment>) -> Invocation {
    let invocation =
        Invocation::new(&config.wrapper_script).current_dir(config.working_dir.as_deref());
    match java_home {
        Some(assignment) => invocation.env(&assignment.name, &assignment.value),
        None => invocation,
    }
}
