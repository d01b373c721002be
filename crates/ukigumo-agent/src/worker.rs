//! Background execution of clone-and-test cycles.
//!
//! Runs are spawned onto the tokio runtime and limited two ways:
//! - a semaphore caps how many execute at once
//! - a per-(repository, branch) mutex keeps runs for one key strictly
//!   sequential, since they share a checkout directory
//!
//! Every spawned run is watched by a supervisor task, so a panicking run
//! still ends with a `failed` registry record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn, Instrument};
use ukigumo_core::obs;
use ukigumo_core::{LogBuffer, Report, ReportSink, RunOptions, TestRunner};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::registry::{RunKey, RunRegistry, RunState};
use crate::workspace::{project_name, Workspace};

/// Settings shared by every run.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub workspace: Workspace,
    pub workers: usize,
    pub clone_timeout: Option<Duration>,
    pub run_options: RunOptions,
}

impl From<&AgentConfig> for WorkerSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            workspace: Workspace::new(&config.workdir),
            workers: config.workers,
            clone_timeout: config.clone_timeout,
            run_options: RunOptions::default().with_command_timeout(config.command_timeout),
        }
    }
}

/// Cloneable handle to the pool of background runs.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

struct Inner {
    settings: WorkerSettings,
    registry: Arc<RunRegistry>,
    sink: Arc<dyn ReportSink>,
    permits: Semaphore,
    locks: Mutex<HashMap<RunKey, Arc<Mutex<()>>>>,
    active: AtomicUsize,
}

impl WorkerPool {
    pub fn new(
        settings: WorkerSettings,
        registry: Arc<RunRegistry>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let permits = Semaphore::new(settings.workers.max(1));
        Self {
            inner: Arc::new(Inner {
                settings,
                registry,
                sink,
                permits,
                locks: Mutex::new(HashMap::new()),
                active: AtomicUsize::new(0),
            }),
        }
    }

    /// Record a queued run for `key` and start it in the background.
    ///
    /// Returns as soon as the run is recorded; the run itself waits for the
    /// key's previous run and for a free worker.
    pub async fn enqueue(&self, key: RunKey) -> Uuid {
        let id = self.inner.registry.queue(&key).await;
        self.inner.active.fetch_add(1, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let job_key = key.clone();
        let handle = tokio::spawn(async move { inner.run(job_key, id).await });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(key = %key, run_id = %id, error = %e, "Run aborted");
                let message = if e.is_panic() {
                    "run panicked"
                } else {
                    "run cancelled"
                };
                inner.registry.fail(&key, id, None, message).await;
            }
            inner.prune_lock(&key).await;
            inner.active.fetch_sub(1, Ordering::SeqCst);
        });

        id
    }

    /// Number of runs enqueued and not yet done.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Number of keys holding a serialization lock. Zero once idle.
    pub async fn tracked_keys(&self) -> usize {
        self.inner.locks.lock().await.len()
    }

    /// Wait until no run is active, up to `grace`. Returns true if idle.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        while self.active() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}

impl Inner {
    async fn key_lock(&self, key: &RunKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the lock for `key` once no queued or running run holds it.
    ///
    /// Runs take their clone under the map lock, so a count of one means
    /// only the map refers to it.
    async fn prune_lock(&self, key: &RunKey) {
        let mut locks = self.locks.lock().await;
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    async fn run(&self, key: RunKey, id: Uuid) {
        let lock = self.key_lock(&key).await;
        let _serial = lock.lock().await;
        let Ok(_permit) = self.permits.acquire().await else {
            warn!(key = %key, "Worker pool closed, dropping run");
            return;
        };

        let project = project_name(&key.repository);
        let span = obs::run_span(&project);
        self.execute(&key, id, project).instrument(span).await;
    }

    async fn execute(&self, key: &RunKey, id: Uuid, project: String) {
        self.registry.advance(key, id, RunState::Cloning).await;
        let dir = match self.settings.workspace.prepare(key).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(key = %key, error = %e, "Cannot prepare checkout directory");
                self.registry.fail(key, id, None, e.to_string()).await;
                return;
            }
        };
        info!("Testing {}@{} to {}", key.repository, key.branch, dir.display());

        let mut buf = LogBuffer::new();
        let cloned = self
            .settings
            .workspace
            .clone_into(
                key,
                &dir,
                &mut buf,
                self.settings.clone_timeout,
                self.settings.run_options.env.clone(),
            )
            .await;
        if let Err(e) = cloned {
            error!("git clone failed: {}", buf.to_string_lossy());
            self.registry.fail(key, id, None, e.to_string()).await;
            return;
        }

        info!("run tests");
        self.registry.advance(key, id, RunState::Running).await;
        let outcome = TestRunner::run(&dir, &self.settings.run_options).await;

        let report = Report::from_outcome(project, &outcome)
            .with_branch(&key.branch)
            .with_repo(&key.repository);
        match self.sink.submit(&report).await {
            Ok(receipt) => {
                info!(http_status = receipt.http_status, "Report delivered");
                let error = outcome.error.as_ref().map(|e| e.to_string());
                self.registry.finish(key, id, outcome.status, error).await;
            }
            Err(e) => {
                error!(key = %key, error = %e, "Report delivery failed");
                let message = format!("report failed: {}", e);
                self.registry
                    .fail(key, id, Some(outcome.status), message)
                    .await;
            }
        }

        info!("... Finished!");
    }
}
