//! Run orchestration.
//!
//! Splits the work list into balanced chunks, runs one [`Worker`] per chunk
//! as its own tokio task, and waits for all of them. The first worker that
//! fails (or panics) takes the whole run down with it: the remaining workers
//! are aborted and the error is returned.

use crate::Result;
use crate::engine::{ConnectionPool, DEFAULT_QUERY_TIMEOUT};
use crate::error::ProbeError;
use crate::models::{WorkItem, WorkerId, WorkerOutcome};
use crate::partition::partition;
use crate::probe::ProbeMode;
use crate::reporter::Reporter;
use crate::worker::Worker;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinSet};
use tracing::Instrument;
use uuid::Uuid;

/// Identifies one probe run in the logs
pub type RunId = Uuid;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Settings for one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRunConfig {
    /// Catalog every work item lives in
    pub catalog: String,
    /// Requested worker count
    pub workers: usize,
    /// Live or dry-run
    pub mode: ProbeMode,
    /// Bound on each metadata or probe query
    pub query_timeout: Duration,
}

impl ProbeRunConfig {
    /// Creates a live-run config with default worker count and timeout.
    pub fn new(catalog: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            workers: DEFAULT_WORKERS,
            mode: ProbeMode::Live,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Builder method to set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Builder method to set live or dry-run probing.
    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method to set the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Validates run settings.
    ///
    /// # Errors
    /// Returns a configuration error for a blank catalog, zero workers or a
    /// zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.trim().is_empty() {
            return Err(ProbeError::configuration("catalog cannot be blank"));
        }
        if self.workers == 0 {
            return Err(ProbeError::configuration("workers must be at least 1"));
        }
        if self.query_timeout.is_zero() {
            return Err(ProbeError::configuration(
                "query_timeout must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// What a completed run hands back.
///
/// Probe results are not part of it; they only exist as log entries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RunOutcome {
    /// Correlates every log line of the run
    pub run_id: RunId,
    /// One entry per worker, ordered by worker id
    pub workers: Vec<WorkerOutcome>,
}

impl RunOutcome {
    /// Work items drained across all workers
    pub fn tables(&self) -> usize {
        self.workers.iter().map(|w| w.tables).sum()
    }
}

/// Number of workers actually started for `requested` workers, `items`
/// work items and a pool of `capacity` connections.
///
/// Never more workers than items, and never more than the pool can serve at
/// once; a worker that could not get a connection would fail the run.
pub fn effective_workers(requested: usize, items: usize, capacity: usize) -> usize {
    requested.min(items).min(capacity.max(1))
}

/// Probes every column of every table in `work_list`.
///
/// # Errors
/// Returns a configuration error for an invalid `config`, otherwise the first
/// fatal worker error. All other workers have been stopped by then.
pub async fn run(
    work_list: Vec<WorkItem>,
    config: &ProbeRunConfig,
    pool: Arc<dyn ConnectionPool>,
    reporter: Arc<dyn Reporter>,
) -> Result<RunOutcome> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);

    let workers = effective_workers(config.workers, work_list.len(), pool.capacity());
    if workers < config.workers.min(work_list.len()) {
        tracing::warn!(
            parent: &span,
            "Requested {} workers but {} allows {} connections; using {}",
            config.workers,
            pool.describe(),
            pool.capacity(),
            workers
        );
    }

    if work_list.is_empty() {
        tracing::warn!(parent: &span, "Work list is empty, nothing to probe");
        return Ok(RunOutcome {
            run_id,
            workers: Vec::new(),
        });
    }

    tracing::info!(
        parent: &span,
        "Probing {} table(s) in {} with {} worker(s){}",
        work_list.len(),
        config.catalog,
        workers,
        if config.mode == ProbeMode::DryRun {
            " (dry run)"
        } else {
            ""
        }
    );

    let mut tasks = JoinSet::new();
    let mut task_workers: HashMap<Id, WorkerId> = HashMap::new();

    for (index, chunk) in partition(&work_list, workers).into_iter().enumerate() {
        let id = WorkerId(index);
        let worker = Worker::new(
            id,
            chunk.to_vec(),
            config.catalog.clone(),
            Arc::clone(&pool),
            Arc::clone(&reporter),
        )
        .with_mode(config.mode)
        .with_query_timeout(config.query_timeout);

        let worker_span = tracing::info_span!(parent: &span, "worker", worker = %id);
        let handle = tasks.spawn(worker.run().instrument(worker_span));
        task_workers.insert(handle.id(), id);
    }

    let mut outcomes = Vec::with_capacity(task_workers.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, Ok(outcome))) => outcomes.push(outcome),
            Ok((task, Err(error))) => {
                let worker = task_workers.get(&task).copied();
                tracing::error!(
                    parent: &span,
                    "{} failed, stopping remaining workers: {error}",
                    worker.map_or_else(|| "worker".to_string(), |w| w.to_string())
                );
                tasks.shutdown().await;
                return Err(error);
            }
            Err(join_error) if join_error.is_cancelled() => {
                tracing::trace!(parent: &span, "task {} was cancelled", join_error.id());
            }
            Err(join_error) => {
                let worker = task_workers
                    .get(&join_error.id())
                    .map_or_else(|| "unknown".to_string(), |w| w.to_string());
                tracing::error!(parent: &span, "{worker} panicked, stopping remaining workers");
                tasks.shutdown().await;
                return Err(ProbeError::Worker {
                    worker,
                    message: join_error.to_string(),
                });
            }
        }
    }

    outcomes.sort_by_key(|o| o.worker);
    tracing::info!(parent: &span, "All {} worker(s) finished", outcomes.len());
    Ok(RunOutcome {
        run_id,
        workers: outcomes,
    })
}
