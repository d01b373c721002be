//! HTTP routes.

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use ukigumo_core::DEFAULT_BRANCH;

use crate::error::AgentError;
use crate::registry::{RunKey, RunRecord};
use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../templates/index.html");
const DOCS_API_HTML: &str = include_str!("../templates/docs-api.html");

/// Build the agent's router with its middleware stack.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/docs/api", get(docs_api))
        .route("/api/v0/enqueue", get(enqueue).post(enqueue))
        .route("/api/v0/runs", get(list_runs))
        .route("/api/v0/status", get(run_status))
        // Panic recovery: a panicking handler answers 500 instead of dropping the connection.
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn docs_api() -> Html<&'static str> {
    Html(DOCS_API_HTML)
}

/// Raw `name=value` pairs as sent; a malformed source counts as empty.
type Pairs = Vec<(String, String)>;

/// `repository` / `branch` from the query string or a form body.
#[derive(Debug, Default)]
pub struct RunParams {
    pub repository: String,
    pub branch: String,
}

impl RunParams {
    /// Collect known fields from `pairs`. A repeated field keeps its first value.
    fn from_pairs(pairs: Pairs) -> RunParams {
        let mut repository = None;
        let mut branch = None;
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "repository" => &mut repository,
                "branch" => &mut branch,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        RunParams {
            repository: repository.unwrap_or_default(),
            branch: branch.unwrap_or_default(),
        }
    }

    fn from_request(
        query: Result<Query<Pairs>, QueryRejection>,
        form: Option<Result<Form<Pairs>, FormRejection>>,
    ) -> RunParams {
        let query = RunParams::from_pairs(query.map(|Query(q)| q).unwrap_or_default());
        let form = form
            .and_then(Result::ok)
            .map(|Form(f)| RunParams::from_pairs(f));
        query.merge(form)
    }

    /// Form values win over query values when both are non-empty.
    fn merge(self, form: Option<RunParams>) -> RunParams {
        let form = form.unwrap_or_default();
        RunParams {
            repository: non_empty_or(form.repository, self.repository),
            branch: non_empty_or(form.branch, self.branch),
        }
    }

    fn into_key(self) -> Result<RunKey, AgentError> {
        if self.repository.is_empty() {
            return Err(AgentError::MissingParameter("repository"));
        }
        let branch = if self.branch.is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            self.branch
        };
        Ok(RunKey::new(self.repository, branch))
    }
}

fn non_empty_or(preferred: String, fallback: String) -> String {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub success: bool,
    pub message: String,
}

async fn enqueue(
    State(state): State<AppState>,
    query: Result<Query<Pairs>, QueryRejection>,
    form: Result<Form<Pairs>, FormRejection>,
) -> Json<EnqueueResponse> {
    let params = RunParams::from_request(query, Some(form));

    let key = match params.into_key() {
        Ok(key) => key,
        Err(e) => {
            return Json(EnqueueResponse {
                success: false,
                message: e.to_string(),
            })
        }
    };

    let id = state.workers.enqueue(key.clone()).await;
    info!(repository = %key.repository, branch = %key.branch, run_id = %id, "Run enqueued");

    Json(EnqueueResponse {
        success: true,
        message: "enqueued.".to_string(),
    })
}

async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    Json(state.registry.list().await)
}

async fn run_status(
    State(state): State<AppState>,
    query: Result<Query<Pairs>, QueryRejection>,
) -> Result<Json<RunRecord>, AgentError> {
    let key = RunParams::from_request(query, None).into_key()?;
    match state.registry.get(&key).await {
        Some(record) => Ok(Json(record)),
        None => Err(AgentError::RunNotFound {
            repository: key.repository,
            branch: key.branch,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(repository: &str, branch: &str) -> RunParams {
        RunParams {
            repository: repository.to_string(),
            branch: branch.to_string(),
        }
    }

    #[test]
    fn test_branch_defaults_to_master() {
        let key = params("git://example.com/a.git", "").into_key().unwrap();
        assert_eq!(key.branch, "master");
    }

    #[test]
    fn test_repository_is_mandatory() {
        let err = params("", "devel").into_key().unwrap_err();
        assert_eq!(err.to_string(), "Missing mandatory parameter: repository");
    }

    #[test]
    fn test_form_overrides_query() {
        let merged = params("from-query", "q").merge(Some(params("from-form", "")));
        assert_eq!(merged.repository, "from-form");
        assert_eq!(merged.branch, "q");

        let merged = params("from-query", "").merge(None);
        assert_eq!(merged.repository, "from-query");
    }

    fn pairs(raw: &[(&str, &str)]) -> Pairs {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_field_keeps_first_value() {
        let params = RunParams::from_pairs(pairs(&[
            ("repository", "first"),
            ("branch", "devel"),
            ("repository", "second"),
            ("branch", "other"),
            ("unrelated", "x"),
        ]));
        assert_eq!(params.repository, "first");
        assert_eq!(params.branch, "devel");
    }

    #[test]
    fn test_empty_first_value_is_kept() {
        let params = RunParams::from_pairs(pairs(&[
            ("repository", "repo"),
            ("branch", ""),
            ("branch", "devel"),
        ]));
        assert_eq!(params.branch, "");
        assert_eq!(params.into_key().unwrap().branch, "master");
    }

    #[test]
    fn test_enqueue_response_shape() {
        let body = serde_json::to_string(&EnqueueResponse {
            success: true,
            message: "enqueued.".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"success":true,"message":"enqueued."}"#);
    }
}
