//! Command-line flags and the runtime configuration derived from them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::AgentError;

/// Directory under `$HOME` used when `--workdir` is not given.
pub const DEFAULT_WORKDIR_NAME: &str = ".go-ukigumo-agent";

#[derive(Parser, Debug)]
#[command(name = "ukigumo-agent")]
#[command(author = "Ukigumo Developers")]
#[command(about = "Clone repositories on request, run their tests and report", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Args {
    /// Collector URL reports are posted to
    #[arg(long, env = "UKIGUMO_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Working directory for checkouts (default: ~/.go-ukigumo-agent)
    #[arg(long, env = "UKIGUMO_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Address the HTTP server listens on
    #[arg(long, env = "UKIGUMO_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Maximum number of runs executing at once
    #[arg(long, env = "UKIGUMO_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Per-command deadline for build and test steps, in seconds
    #[arg(long, env = "UKIGUMO_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// Deadline for `git clone`, in seconds
    #[arg(long, env = "UKIGUMO_CLONE_TIMEOUT", default_value = "600")]
    pub clone_timeout: u64,

    /// Deadline for posting a report, in seconds
    #[arg(long, env = "UKIGUMO_REPORT_TIMEOUT", default_value = "30")]
    pub report_timeout: u64,

    /// Seconds to wait for in-flight runs on shutdown
    #[arg(long, default_value = "30")]
    pub shutdown_grace: u64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the version and exit
    #[arg(long)]
    pub version: bool,
}

/// Validated agent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub endpoint: String,
    pub workdir: PathBuf,
    pub listen: SocketAddr,
    pub workers: usize,
    pub command_timeout: Option<Duration>,
    pub clone_timeout: Option<Duration>,
    pub report_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Args {
    /// Validate the flags and fill in defaults that need the environment.
    pub fn into_config(self) -> Result<AgentConfig, AgentError> {
        let endpoint = match self.endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint,
            _ => {
                return Err(AgentError::Config(
                    "You must set endpoint url by arguments.".to_string(),
                ))
            }
        };

        let workdir = match self.workdir {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => default_workdir()?,
        };

        if self.workers == 0 {
            return Err(AgentError::Config(
                "--workers must be at least 1".to_string(),
            ));
        }

        Ok(AgentConfig {
            endpoint,
            workdir,
            listen: self.listen,
            workers: self.workers,
            command_timeout: self.command_timeout.map(Duration::from_secs),
            clone_timeout: Some(Duration::from_secs(self.clone_timeout)),
            report_timeout: Duration::from_secs(self.report_timeout),
            shutdown_grace: Duration::from_secs(self.shutdown_grace),
        })
    }
}

/// `$HOME/.go-ukigumo-agent`
pub fn default_workdir() -> Result<PathBuf, AgentError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_WORKDIR_NAME))
        .ok_or_else(|| AgentError::Config("Cannot determine the home directory".to_string()))
}
