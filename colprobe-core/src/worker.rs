//! A single probing worker.
//!
//! A worker owns one chunk of the work list and one connection. It walks the
//! chunk strictly in order, enumerating each table and then probing its
//! columns one at a time. The only error it returns is failing to get a
//! connection; everything else is reported and skipped.

use crate::Result;
use crate::engine::ConnectionPool;
use crate::models::{ProbeEvent, WorkItem, WorkerId, WorkerOutcome};
use crate::probe::{self, ProbeContext, ProbeMode};
use crate::reporter::Reporter;
use std::sync::Arc;
use std::time::Duration;

/// One unit of concurrency in a probe run.
pub struct Worker {
    id: WorkerId,
    items: Vec<WorkItem>,
    catalog: String,
    mode: ProbeMode,
    query_timeout: Duration,
    pool: Arc<dyn ConnectionPool>,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("items", &self.items.len())
            .field("catalog", &self.catalog)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Worker {
    /// Creates a worker for `items` that reports through `reporter`.
    pub fn new(
        id: WorkerId,
        items: Vec<WorkItem>,
        catalog: impl Into<String>,
        pool: Arc<dyn ConnectionPool>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            id,
            items,
            catalog: catalog.into(),
            mode: ProbeMode::default(),
            query_timeout: crate::engine::DEFAULT_QUERY_TIMEOUT,
            pool,
            reporter,
        }
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

    /// This worker's identity
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Drains the chunk.
    ///
    /// The connection is acquired once up front and returned to the pool
    /// when this future completes or is dropped.
    ///
    /// # Errors
    /// Returns the pool's error if no connection could be acquired. Nothing
    /// has been queried at that point.
    pub async fn run(self) -> Result<WorkerOutcome> {
        let mut conn = self.pool.acquire().await?;
        self.reporter.record(
            self.id,
            &ProbeEvent::ConnectionAcquired {
                pool: self.pool.describe(),
            },
        );

        let ctx = ProbeContext {
            worker: self.id,
            reporter: self.reporter.as_ref(),
            query_timeout: self.query_timeout,
        };
        let mut outcome = WorkerOutcome::new(self.id);

        for item in &self.items {
            let table = item.in_catalog(&self.catalog);
            outcome.tables = outcome.tables.saturating_add(1);

            let Ok(columns) = probe::enumerate_columns(conn.as_mut(), &table, ctx).await else {
                continue;
            };

            for column in &columns {
                match self.mode {
                    ProbeMode::Live => {
                        probe::probe_column(conn.as_mut(), &table, column, ctx).await;
                    }
                    ProbeMode::DryRun => {
                        probe::report_would_probe(&table, column, ctx);
                    }
                }
            }
        }

        tracing::debug!("{} drained {} table(s)", self.id, outcome.tables);
        Ok(outcome)
    }
}
