//! ukigumo-client - run the test suite in a project directory once
//!
//! Detects `Build.PL` / `Makefile.PL`, runs configure, build and test,
//! then posts the result to the collector given by `--endpoint`.
//!
//! ```text
//! ukigumo-client --endpoint http://ci.example.com/api/v1/report/add
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, Instrument, Level};

use ukigumo_core::obs;
use ukigumo_core::{report, Report, ReporterConfig, RunOptions, TestRunner};

#[derive(Parser, Debug)]
#[command(name = "ukigumo-client")]
#[command(author = "Ukigumo Developers")]
#[command(about = "Run a Perl project's tests and report the result", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Collector URL the report is posted to
    #[arg(long, env = "UKIGUMO_ENDPOINT")]
    endpoint: Option<String>,

    /// Project name (default: base name of the project directory)
    #[arg(long)]
    project: Option<String>,

    /// Project directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Per-command deadline in seconds (default: none)
    #[arg(long, env = "UKIGUMO_COMMAND_TIMEOUT")]
    command_timeout: Option<u64>,

    /// Deadline for posting the report, in seconds
    #[arg(long, env = "UKIGUMO_REPORT_TIMEOUT", default_value = "30")]
    report_timeout: u64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the version and exit
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help output counts as a usage failure too.
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if cli.version {
        eprintln!("ukigumo-client: {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    ukigumo_core::telemetry::init_tracing(cli.json, level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = run_options(&cli);
    run_with(cli, options).await
}

fn run_options(cli: &Cli) -> RunOptions {
    RunOptions::default().with_command_timeout(cli.command_timeout.map(Duration::from_secs))
}

/// Run the pipeline in `cli.dir` with `options` and post the result.
async fn run_with(cli: Cli, options: RunOptions) -> Result<()> {
    let endpoint = match cli.endpoint.as_deref() {
        Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
        _ => bail!("You must set endpoint url by arguments."),
    };

    let project = match cli.project {
        Some(project) if !project.is_empty() => project,
        _ => project_name(&cli.dir)?,
    };

    let dir = cli.dir;
    let report_timeout = Duration::from_secs(cli.report_timeout);
    let span = obs::run_span(&project);
    async move {
        info!("Endpoint: {}", endpoint);

        let outcome = TestRunner::run(&dir, &options).await;
        info!("status: {}", outcome.status.code());

        match &outcome.error {
            None => info!("out: {}", outcome.log_lossy()),
            Some(e) => {
                error!("{}", e);
                info!("{}", outcome.log_lossy());
            }
        }

        let config = ReporterConfig {
            timeout: Some(report_timeout),
            ..ReporterConfig::default()
        };
        let receipt = report(&endpoint, &Report::from_outcome(project, &outcome), config)
            .await
            .context("Failed to post report")?;
        info!(http_status = receipt.http_status, "{}", receipt.body);

        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}

/// Base name of `dir` after resolving `.` and symlinks.
fn project_name(dir: &Path) -> Result<String> {
    let resolved = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve project directory {}", dir.display()))?;
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no base name", resolved.display()))
}
