//! Command-line runner for the Riemann Sum UI test script.
//!
//! # Usage
//!
//! ```bash
//! # Run the script against the agent on localhost:9800
//! riemann-uitest run
//!
//! # Run against the in-memory app, keep a JSONL log of the results
//! riemann-uitest run --simulated --save-log
//!
//! # Wait 300 ms after each typed value
//! riemann-uitest run --settle-ms 300
//!
//! # Agent on another host, bringing the app to the foreground first
//! riemann-uitest --host 192.168.1.20 --target com.example.RiemannSum run
//!
//! # Print the current accessibility tree
//! riemann-uitest tree
//!
//! # Print the script steps as JSON
//! riemann-uitest steps
//! ```
//!
//! Exit codes: 0 all assertions passed, 1 an assertion failed, 2 connection or
//! driver error, 3 run aborted (no main window, element not found),
//! 4 I/O or configuration error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use riemann_uitest_core::config::{logs_dir, RunnerConfig};
use riemann_uitest_core::driver::{AutomationDriver, DriverConfig, DriverError};
use riemann_uitest_core::logger::{RecordingLogger, TracingLogger};
use riemann_uitest_core::query::main_window;
use riemann_uitest_core::runner::{RunReport, RunnerError, ScriptRunner};
use riemann_uitest_core::script::riemann_sum_script;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "riemann-uitest.log";

/// Runs the Riemann Sum UI test script.
#[derive(Parser)]
#[command(name = "riemann-uitest")]
#[command(about = "Scripted UI tests for the Riemann Sum graphing app")]
#[command(version)]
struct Cli {
    /// Agent host (overrides the config file)
    #[arg(long, env = "RIEMANN_UITEST_HOST")]
    host: Option<String>,

    /// Agent port (overrides the config file)
    #[arg(short, long, env = "RIEMANN_UITEST_PORT")]
    port: Option<u16>,

    /// Bundle id to bring to the foreground before running
    #[arg(short, long, env = "RIEMANN_UITEST_TARGET")]
    target: Option<String>,

    /// Also write tracing output to ~/.riemann-uitest/logs/riemann-uitest.log
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the test script
    Run {
        /// Use the in-memory app instead of the agent
        #[arg(long)]
        simulated: bool,
        /// Write the results to ~/.riemann-uitest/logs/<run-id>.jsonl
        #[arg(long)]
        save_log: bool,
        /// Pause after each typed value, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,
    },

    /// Print the accessibility tree of the foreground app
    Tree {
        /// Use the in-memory app instead of the agent
        #[arg(long)]
        simulated: bool,
        /// Print raw JSON instead of an outline
        #[arg(long)]
        json: bool,
    },

    /// Print the script steps as JSON
    Steps,
}

#[derive(Debug)]
enum CliError {
    AssertionsFailed { failed: usize, total: usize },
    Connection(String),
    Aborted(String),
    Io(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::AssertionsFailed { .. } => ExitCode::from(1),
            CliError::Connection(_) => ExitCode::from(2),
            CliError::Aborted(_) => ExitCode::from(3),
            CliError::Io(_) => ExitCode::from(4),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::AssertionsFailed { failed, total } => {
                write!(f, "{} of {} assertions failed", failed, total)
            }
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::Aborted(msg) => write!(f, "Run aborted: {}", msg),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl From<DriverError> for CliError {
    fn from(e: DriverError) -> Self {
        CliError::Connection(e.to_string())
    }
}

impl From<RunnerError> for CliError {
    fn from(e: RunnerError) -> Self {
        match e.exit_code() {
            3 => CliError::Aborted(e.to_string()),
            _ => CliError::Connection(e.to_string()),
        }
    }
}

fn init_tracing(log_file: bool) {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let file_layer = if log_file {
        match logs_dir() {
            Ok(dir) => {
                let appender = tracing_appender::rolling::never(&dir, LOG_FILE_NAME);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(appender)
                        .with_ansi(false)
                        .with_filter(EnvFilter::new("info")),
                )
            }
            Err(e) => {
                eprintln!("Warning: cannot open log directory: {}", e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_file);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// File config with command-line overrides applied.
fn resolve_config(cli: &Cli, settle_ms: Option<u64>) -> RunnerConfig {
    let mut config = RunnerConfig::load();
    if let Some(host) = &cli.host {
        config.agent_host = host.clone();
    }
    if let Some(port) = cli.port {
        config.agent_port = port;
    }
    if let Some(target) = &cli.target {
        config.target_bundle_id = Some(target.clone());
    }
    if let Some(ms) = settle_ms {
        config.settle_delay_ms = ms;
    }
    debug!(?config, "resolved config");
    config
}

fn driver_config(config: &RunnerConfig, simulated: bool) -> DriverConfig {
    if simulated {
        DriverConfig::Simulated
    } else {
        DriverConfig::Agent {
            host: config.agent_host.clone(),
            port: config.agent_port,
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Run {
            simulated,
            save_log,
            settle_ms,
        } => {
            let config = resolve_config(&cli, *settle_ms);
            let driver = driver_config(&config, *simulated).connect().await?;
            run_script(driver, &config, *save_log).await
        }
        Command::Tree { simulated, json } => {
            let config = resolve_config(&cli, None);
            let driver = driver_config(&config, *simulated).connect().await?;
            if let Some(target) = &config.target_bundle_id {
                driver.set_target(target).await?;
            }
            print_tree(driver.as_ref(), *json).await
        }
        Command::Steps => {
            let json = serde_json::to_string_pretty(&riemann_sum_script())
                .map_err(|e| CliError::Io(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
    }
}

async fn run_script(
    driver: Arc<dyn AutomationDriver>,
    config: &RunnerConfig,
    save_log: bool,
) -> Result<(), CliError> {
    let recorder = RecordingLogger::new();
    let runner = ScriptRunner::new(driver, (TracingLogger::new(), &recorder))
        .with_options(config.to_options());

    let report = runner.run(&riemann_sum_script()).await?;

    if save_log {
        let path = save_run_log(&recorder, &report)?;
        eprintln!("Log written to {}", path.display());
    }

    let total = report.outcomes.len();
    let failed = total - report.passed_count();
    println!("{} of {} assertions passed", report.passed_count(), total);
    if failed > 0 {
        return Err(CliError::AssertionsFailed { failed, total });
    }
    Ok(())
}

fn save_run_log(recorder: &RecordingLogger, report: &RunReport) -> Result<PathBuf, CliError> {
    let dir = logs_dir().map_err(|e| CliError::Io(e.to_string()))?;
    let path = dir.join(format!("{}.jsonl", report.run_id));
    recorder
        .write_jsonl(&path)
        .map_err(|e| CliError::Io(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), "saved run log");
    Ok(path)
}

async fn print_tree(driver: &dyn AutomationDriver, json: bool) -> Result<(), CliError> {
    let roots = driver.dump_tree().await?;
    if json {
        let out =
            serde_json::to_string_pretty(&roots).map_err(|e| CliError::Io(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }
    if main_window(&roots).is_none() {
        return Err(CliError::Aborted("application has no main window".to_string()));
    }
    for root in &roots {
        print!("{}", root.outline());
    }
    Ok(())
}
