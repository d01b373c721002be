//! ukigumo agent - clone, test and report on request
//!
//! An HTTP service that accepts `(repository, branch)` jobs:
//! - `GET|POST /api/v0/enqueue` schedules a clone of the branch into the
//!   working directory, runs its tests and posts the report
//! - `GET /api/v0/runs` and `GET /api/v0/status` expose the latest run per key
//! - `GET /` and `GET /docs/api` serve static pages

pub mod config;
pub mod error;
pub mod registry;
pub mod routes;
pub mod state;
pub mod worker;
pub mod workspace;

pub use config::{AgentConfig, Args};
pub use error::AgentError;
pub use registry::{RunKey, RunRecord, RunRegistry, RunState};
pub use routes::router;
pub use state::AppState;
pub use worker::{WorkerPool, WorkerSettings};
pub use workspace::Workspace;
