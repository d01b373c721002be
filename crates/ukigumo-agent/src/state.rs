use std::sync::Arc;

use crate::registry::RunRegistry;
use crate::worker::WorkerPool;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone: every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Latest run per (repository, branch).
    pub registry: Arc<RunRegistry>,
    /// Background runner for enqueued jobs.
    pub workers: WorkerPool,
}

impl AppState {
    pub fn new(registry: Arc<RunRegistry>, workers: WorkerPool) -> Self {
        Self { registry, workers }
    }
}
