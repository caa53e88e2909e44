//! gradle-ci - Run a Gradle build as a CI task
//!
//! Reads task inputs from `INPUT_*` variables (or `.gradle-ci.toml`), runs the
//! Gradle wrapper and reports back to the agent through `##vso[...]` commands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gradle_ci_cli::logging::{self, LogConfig};
use gradle_ci_cli::output::{self, format_count, format_duration, Status};
use gradle_ci_core::config::Config;
use gradle_ci_core::environment::HostEnvironment;
use gradle_ci_core::error::{exit_codes, Error};
use gradle_ci_core::fs::LocalFileSystem;
use gradle_ci_core::host::{ConsoleHost, HostCommand, TaskHost};
use gradle_ci_core::process::TokioProcessRunner;
use gradle_ci_task::GradleTask;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser)]
#[command(name = "gradle-ci")]
#[command(about = "Run a Gradle build as a CI task")]
#[command(version)]
struct Cli {
    /// Configuration file (default: discover .gradle-ci.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding CodeAnalysis/sonar.gradle
    #[arg(long, global = true, env = "GRADLE_CI_TASK_DIR")]
    task_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build and report to the CI host
    Run,

    /// Validate inputs and print the planned command lines as JSON
    Check,
}

/// Host for `check`: everything goes to stderr so stdout stays valid JSON
struct StatusHost;

impl TaskHost for StatusHost {
    fn command(&self, command: &HostCommand) {
        Status::info(&command.to_string());
    }

    fn info(&self, message: &str) {
        Status::info(message);
    }

    fn error(&self, message: &str) {
        Status::error(message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        output::disable_colors();
    }
    logging::init(&LogConfig {
        verbosity: cli.verbose,
        json: cli.log_json,
    })?;

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            Status::failure(&e);
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };
    let task_dir = resolve_task_dir(cli.task_dir.as_deref(), &config);

    let code = match cli.command {
        Commands::Run => run(&config, task_dir).await,
        Commands::Check => check(&config, task_dir),
    };

    std::process::exit(code);
}

/// `--task-dir`, then `[task] directory`, then the executable's directory
fn resolve_task_dir(flag: Option<&Path>, config: &Config) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.schema.task.directory.clone())
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn run(config: &Config, task_dir: PathBuf) -> i32 {
    let started = Instant::now();
    let env = HostEnvironment::from_process(config.schema.clone());
    let fs = LocalFileSystem::new();
    let runner = TokioProcessRunner::new()
        .with_echo(config.schema.task.echo_output)
        .with_timeout(config.schema.task.timeout_secs.map(Duration::from_secs));
    let host = ConsoleHost::new();

    let outcome = GradleTask::new(&env, &fs, &runner, &host, task_dir).run().await;
    info!(
        elapsed = %format_duration(started.elapsed()),
        invocations = outcome.invocations.len(),
        "run complete"
    );

    if outcome.succeeded() {
        exit_codes::SUCCESS
    } else {
        exit_codes::FAILURE
    }
}

fn exit_code_for(error: &Error) -> i32 {
    if error.code.is_pre_execution() {
        exit_codes::CONFIG_ERROR
    } else {
        exit_codes::FAILURE
    }
}

/// Status line on stderr, the error report as JSON on stdout
fn check_failed(error: &Error) -> i32 {
    Status::failure(error);
    match serde_json::to_string_pretty(&error.to_report()) {
        Ok(json) => println!("{}", json),
        Err(e) => Status::error(&format!("Failed to serialize error report: {}", e)),
    }
    exit_code_for(error)
}

fn check(config: &Config, task_dir: PathBuf) -> i32 {
    Status::header("gradle-ci check");
    if let Some(path) = &config.path {
        Status::info(&format!("Using {}", path.display()));
    }

    let env = HostEnvironment::from_process(config.schema.clone());
    let fs = LocalFileSystem::new();
    let runner = TokioProcessRunner::new();
    let host = StatusHost;

    let prepared = match GradleTask::new(&env, &fs, &runner, &host, task_dir).prepare() {
        Ok(prepared) => prepared,
        Err(e) => return check_failed(&e),
    };

    let plan = prepared.plan();
    match serde_json::to_string_pretty(&plan) {
        Ok(json) => println!("{}", json),
        Err(e) => return check_failed(&Error::from(e)),
    }

    let invocations = 1 + usize::from(plan.probe.is_some());
    Status::success(&format!(
        "Inputs valid, {} planned",
        format_count(invocations, "invocation", "invocations")
    ));
    exit_codes::SUCCESS
}
