//! ukigumo core - build detection, execution and reporting
//!
//! Provides the pipeline shared by the client and the agent:
//! - Detects the build system from marker files (`Build.PL`, `Makefile.PL`)
//! - Runs its build-and-test steps, capturing combined output
//! - Classifies the outcome into a [`Status`]
//! - Posts a [`Report`] to the collector endpoint

pub mod build_system;
pub mod detect;
pub mod error;
pub mod executor;
pub mod log;
pub mod obs;
pub mod report;
pub mod runner;
pub mod status;
pub mod telemetry;

// Re-export key types
pub use build_system::{BuildSystem, Step};
pub use detect::{detect, CONFIG_FILE};
pub use error::{CommandError, DetectError, ReportError, RunError};
pub use executor::CommandExecutor;
pub use log::LogBuffer;
pub use report::{
    report, HttpReporter, Report, ReportReceipt, ReportSink, ReporterConfig, DEFAULT_BRANCH,
    PLACEHOLDER_REPO,
};
pub use runner::{RunOptions, RunOutcome, TestRunner};
pub use status::Status;
