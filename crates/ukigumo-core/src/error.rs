//! Error types for the ukigumo pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::status::Status;

/// Failure of a single external command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", exit_description(.code))]
    Exited { command: String, code: Option<i32> },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::TimedOut { .. })
    }
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

/// Failure to pick a build system for a project directory.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(".ukigumo.yml is not supported yet")]
    UnsupportedConfig { path: PathBuf },

    #[error("Unknown project type. There is no .ukigumo.yml, Makefile.PL or Build.PL.")]
    UnknownProjectType { dir: PathBuf },
}

/// First error encountered by a test run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("step {step} of {build_system} failed: {source}")]
    Step {
        build_system: &'static str,
        step: usize,
        #[source]
        source: CommandError,
    },
}

impl RunError {
    /// Status implied by this error when the caller has no better one.
    ///
    /// Step failures carry their own status in the build system's step
    /// table; this is only the fallback classification.
    pub fn fallback_status(&self) -> Status {
        match self {
            RunError::Detect(_) => Status::NotApplicable,
            RunError::Step { source, .. } if source.is_timeout() => Status::Timeout,
            RunError::Step { .. } => Status::Fail,
        }
    }
}

/// Failure to deliver a report to the collector.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid collector endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to send report: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector rejected report with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_error_messages() {
        let err = DetectError::UnsupportedConfig {
            path: PathBuf::from("/tmp/p/.ukigumo.yml"),
        };
        assert_eq!(err.to_string(), ".ukigumo.yml is not supported yet");

        let err = DetectError::UnknownProjectType {
            dir: PathBuf::from("/tmp/p"),
        };
        assert!(err.to_string().starts_with("Unknown project type"));
    }

    #[test]
    fn test_command_error_messages() {
        let err = CommandError::Exited {
            command: "make test".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "`make test` exited with exit code 2");

        let err = CommandError::Exited {
            command: "make".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("signal"));

        let err = CommandError::TimedOut {
            command: "./Build test".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(err.to_string().contains("timed out after 5s"));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_run_error_fallback_status() {
        let detect: RunError = DetectError::UnknownProjectType {
            dir: PathBuf::from("."),
        }
        .into();
        assert_eq!(detect.fallback_status(), Status::NotApplicable);

        let timeout = RunError::Step {
            build_system: "make_maker",
            step: 3,
            source: CommandError::TimedOut {
                command: "make test".to_string(),
                timeout: Duration::from_secs(1),
            },
        };
        assert_eq!(timeout.fallback_status(), Status::Timeout);
    }
}
