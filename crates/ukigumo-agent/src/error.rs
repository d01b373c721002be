use std::io;
use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use ukigumo_core::{CommandError, ReportError};

/// Errors raised by the agent's configuration, workers and handlers.
///
/// Implements [`IntoResponse`] so handlers answer with the same
/// `{"success": false, "message": ...}` shape the enqueue endpoint uses.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Invalid or missing configuration.
    #[error("{0}")]
    Config(String),

    /// Creating or clearing a working directory failed.
    #[error("Failed to prepare working directory {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `git clone` did not produce a checkout.
    #[error("git clone of {repository}@{branch} failed: {source}")]
    Clone {
        repository: String,
        branch: String,
        #[source]
        source: CommandError,
    },

    /// The collector did not accept the report.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// A required request parameter was absent or empty.
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(&'static str),

    /// No run has been recorded for the key.
    #[error("No run recorded for {repository}@{branch}")]
    RunNotFound { repository: String, branch: String },
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = match &self {
            AgentError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            AgentError::RunNotFound { .. } => StatusCode::NOT_FOUND,
            other => {
                tracing::error!(error = %other, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "success": false,
            "message": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let missing = AgentError::MissingParameter("repository").into_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unknown = AgentError::RunNotFound {
            repository: "git://example.com/a.git".into(),
            branch: "master".into(),
        }
        .into_response();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let config = AgentError::Config("bad".into()).into_response();
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_missing_parameter_message() {
        assert_eq!(
            AgentError::MissingParameter("repository").to_string(),
            "Missing mandatory parameter: repository"
        );
    }
}
