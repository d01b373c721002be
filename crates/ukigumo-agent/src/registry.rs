//! In-memory record of the latest run per (repository, branch).
//!
//! A record is created when a run is enqueued and replaced when a later run
//! for the same key is enqueued. Updates carry the run id, so a superseded
//! run can no longer overwrite the record of its successor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use ukigumo_core::Status;
use uuid::Uuid;

/// Identity of a run target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunKey {
    pub repository: String,
    pub branch: String,
}

impl RunKey {
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository, self.branch)
    }
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Cloning,
    Running,
    Finished,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Finished | RunState::Failed)
    }
}

/// One run as exposed by `/api/v0/runs` and `/api/v0/status`.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub repository: String,
    pub branch: String,
    pub state: RunState,
    #[serde(serialize_with = "ukigumo_core::status::serialize_code")]
    pub status: Status,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Process-wide table of run records.
#[derive(Debug, Default)]
pub struct RunRegistry {
    records: RwLock<HashMap<RunKey, RunRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new queued run for `key`, replacing any earlier record.
    pub async fn queue(&self, key: &RunKey) -> Uuid {
        let record = RunRecord {
            id: Uuid::new_v4(),
            repository: key.repository.clone(),
            branch: key.branch.clone(),
            state: RunState::Queued,
            status: Status::Pending,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        let id = record.id;
        self.records.write().await.insert(key.clone(), record);
        id
    }

    /// Move run `id` to a non-terminal state. Returns false if superseded.
    pub async fn advance(&self, key: &RunKey, id: Uuid, state: RunState) -> bool {
        self.update(key, id, |record| {
            if record.started_at.is_none() {
                record.started_at = Some(Utc::now());
            }
            record.state = state;
        })
        .await
    }

    /// Record the terminal status of run `id`.
    pub async fn finish(&self, key: &RunKey, id: Uuid, status: Status, error: Option<String>) -> bool {
        self.update(key, id, |record| {
            record.state = RunState::Finished;
            record.status = status;
            record.error = error;
            record.finished_at = Some(Utc::now());
        })
        .await
    }

    /// Record that run `id` stopped without a delivered result.
    ///
    /// `status` is set when the tests ran but the report was lost.
    pub async fn fail(
        &self,
        key: &RunKey,
        id: Uuid,
        status: Option<Status>,
        message: impl Into<String>,
    ) -> bool {
        let message = message.into();
        self.update(key, id, |record| {
            record.state = RunState::Failed;
            if let Some(status) = status {
                record.status = status;
            }
            record.error = Some(message);
            record.finished_at = Some(Utc::now());
        })
        .await
    }

    pub async fn get(&self, key: &RunKey) -> Option<RunRecord> {
        self.records.read().await.get(key).cloned()
    }

    /// Every record, oldest first.
    pub async fn list(&self) -> Vec<RunRecord> {
        let mut records: Vec<RunRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    async fn update(&self, key: &RunKey, id: Uuid, apply: impl FnOnce(&mut RunRecord)) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(key) {
            Some(record) if record.id == id => {
                apply(record);
                true
            }
            _ => false,
        }
    }
}
