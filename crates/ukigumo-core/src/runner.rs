//! Test run orchestration: detect, then drive the build system's steps.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use crate::build_system::BuildSystem;
use crate::detect::detect;
use crate::error::RunError;
use crate::executor::CommandExecutor;
use crate::log::LogBuffer;
use crate::obs;
use crate::status::Status;

/// Knobs for a single test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Per-command deadline. `None` waits forever.
    pub command_timeout: Option<Duration>,

    /// Extra environment for every command.
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of one complete test run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Terminal status of the run.
    pub status: Status,

    /// Build system that was driven, if detection succeeded.
    pub build_system: Option<BuildSystem>,

    /// Combined output of every executed command, in order.
    pub log: Vec<u8>,

    /// First error encountered; `None` on success.
    pub error: Option<RunError>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Status::Success && self.error.is_none()
    }

    pub fn log_lossy(&self) -> String {
        String::from_utf8_lossy(&self.log).into_owned()
    }
}

/// Runs the build-and-test sequence for a project directory.
pub struct TestRunner;

impl TestRunner {
    /// Detect the build system in `dir` and run its steps.
    ///
    /// Steps are gated: each runs only if the previous one succeeded. A
    /// failing step yields that step's failure status, or
    /// [`Status::Timeout`] if it exceeded `options.command_timeout`.
    pub async fn run(dir: &Path, options: &RunOptions) -> RunOutcome {
        let start = Instant::now();
        let mut buf = LogBuffer::new();

        let build_system = match detect(dir) {
            Ok(system) => system,
            Err(e) => {
                let error = RunError::from(e);
                let status = error.fallback_status();
                obs::emit_run_finished(dir, status, start.elapsed().as_millis() as u64);
                return RunOutcome {
                    status,
                    build_system: None,
                    log: buf.into_bytes(),
                    error: Some(error),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        obs::emit_run_started(dir, build_system);

        let executor = CommandExecutor::new(dir)
            .with_timeout(options.command_timeout)
            .with_env(options.env.clone());
        let (status, error) = Self::run_steps(&executor, build_system, &mut buf).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_run_finished(dir, status, duration_ms);

        RunOutcome {
            status,
            build_system: Some(build_system),
            log: buf.into_bytes(),
            error,
            duration_ms,
        }
    }

    async fn run_steps(
        executor: &CommandExecutor,
        build_system: BuildSystem,
        buf: &mut LogBuffer,
    ) -> (Status, Option<RunError>) {
        for (index, step) in build_system.steps().iter().enumerate() {
            let step_no = index + 1;
            info!(build_system = build_system.name(), step = step_no, command = %step.command_line(), "Executing step");

            let result = executor.run(buf, step.program, step.args).await;
            obs::emit_step_finished(build_system, step_no, result.is_ok());

            if let Err(source) = result {
                let status = if source.is_timeout() {
                    Status::Timeout
                } else {
                    step.on_failure
                };
                let error = RunError::Step {
                    build_system: build_system.name(),
                    step: step_no,
                    source,
                };
                return (status, Some(error));
            }
        }

        (Status::Success, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options_default_has_no_deadline() {
        assert!(RunOptions::default().command_timeout.is_none());
        let opts = RunOptions::default().with_command_timeout(Some(Duration::from_secs(9)));
        assert_eq!(opts.command_timeout, Some(Duration::from_secs(9)));
    }

    #[tokio::test]
    async fn test_unknown_project_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let outcome = TestRunner::run(dir.path(), &RunOptions::default()).await;

        assert_eq!(outcome.status, Status::NotApplicable);
        assert!(outcome.log.is_empty());
        assert!(outcome.build_system.is_none());
        assert!(!outcome.succeeded());
        let message = outcome.error.unwrap().to_string();
        assert!(message.contains("Unknown project type"), "{}", message);
    }

    #[tokio::test]
    async fn test_config_file_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".ukigumo.yml"), "before_install: []\n").unwrap();
        std::fs::write(dir.path().join("Makefile.PL"), "").unwrap();

        let outcome = TestRunner::run(dir.path(), &RunOptions::default()).await;

        assert_eq!(outcome.status, Status::NotApplicable);
        assert!(outcome.log.is_empty());
        assert!(outcome
            .error
            .unwrap()
            .to_string()
            .contains("not supported"));
    }
}
