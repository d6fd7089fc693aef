//! Result reporting.
//!
//! Every enumeration and probe action produces exactly one [`ProbeEvent`].
//! Reporters are shared between all workers, so implementations must be
//! safe to call concurrently. No aggregation happens here.

use crate::models::{ProbeEvent, ProbeStatus, WorkerId};
use std::sync::{Mutex, PoisonError};

/// Sink for probe events.
///
/// # Object Safety
/// This trait is object-safe and is shared as `Arc<dyn Reporter>`.
pub trait Reporter: Send + Sync {
    /// Records one event emitted by `worker`.
    fn record(&self, worker: WorkerId, event: &ProbeEvent);
}

/// Reports events through `tracing`.
///
/// Started events go to DEBUG, successful probes and dry-run entries to INFO,
/// tables with no columns to WARN and all failures to ERROR. The message
/// always carries the full `catalog.schema.table` and column so text logs
/// can be grepped without structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn record(&self, worker: WorkerId, event: &ProbeEvent) {
        match event {
            ProbeEvent::ConnectionAcquired { pool } => {
                tracing::debug!(%worker, "Acquired connection from {pool}");
            }
            ProbeEvent::EnumerationStarted { table, query } => {
                tracing::debug!(%worker, %table, "Enumerating columns: {query}");
            }
            ProbeEvent::ColumnsEnumerated { table, columns: 0 } => {
                tracing::warn!(%worker, %table, "No columns found for {table}, skipping");
            }
            ProbeEvent::ColumnsEnumerated { table, columns } => {
                tracing::debug!(%worker, %table, columns, "Found {columns} column(s) in {table}");
            }
            ProbeEvent::EnumerationFailed { table, error } => {
                tracing::error!(
                    %worker,
                    %table,
                    %error,
                    "Failed to list columns of {table}: {error}"
                );
            }
            ProbeEvent::ProbeStarted {
                table,
                column,
                query,
            } => {
                tracing::debug!(%worker, %table, %column, "Executing: {query}");
            }
            ProbeEvent::Probed(outcome) => match outcome.status {
                ProbeStatus::Success => {
                    tracing::info!(
                        %worker,
                        table = %outcome.table,
                        column = %outcome.column,
                        "Query succeeded for column {}.{}",
                        outcome.table,
                        outcome.column
                    );
                }
                ProbeStatus::Failure => {
                    let error = outcome.detail.as_deref().unwrap_or("unknown error");
                    tracing::error!(
                        %worker,
                        table = %outcome.table,
                        column = %outcome.column,
                        %error,
                        "Query failed for column {}.{}: {error}",
                        outcome.table,
                        outcome.column
                    );
                }
            },
            ProbeEvent::WouldProbe {
                table,
                column,
                query,
            } => {
                tracing::info!(%worker, %table, %column, "Would execute: {query}");
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
///
/// Useful when embedding the prober and inspecting outcomes afterwards
/// instead of reading logs.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<(WorkerId, ProbeEvent)>>,
}

impl CollectingReporter {
    /// Creates an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<(WorkerId, ProbeEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Consumes the collector, returning its events.
    pub fn into_events(self) -> Vec<(WorkerId, ProbeEvent)> {
        self.events
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reporter for CollectingReporter {
    fn record(&self, worker: WorkerId, event: &ProbeEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((worker, event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeOutcome, WorkItem};

    fn outcome() -> ProbeOutcome {
        ProbeOutcome::failure(
            WorkItem::new("sales", "orders").in_catalog("hive"),
            "amount",
            "Cannot cast 'x' to DECIMAL(10,2)",
        )
    }

    #[test]
    fn test_collecting_reporter_keeps_order() {
        let reporter = CollectingReporter::new();
        reporter.record(
            WorkerId(0),
            &ProbeEvent::ConnectionAcquired {
                pool: "p".to_string(),
            },
        );
        reporter.record(WorkerId(1), &ProbeEvent::Probed(outcome()));

        let events = reporter.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, WorkerId(0));
        assert_eq!(events[1], (WorkerId(1), ProbeEvent::Probed(outcome())));
    }

    #[test]
    fn test_tracing_reporter_handles_every_event() {
        let table = WorkItem::new("s", "t").in_catalog("c");
        let events = [
            ProbeEvent::ConnectionAcquired {
                pool: "trino https://h:443/c".to_string(),
            },
            ProbeEvent::EnumerationStarted {
                table: table.clone(),
                query: "SELECT 1".to_string(),
            },
            ProbeEvent::ColumnsEnumerated {
                table: table.clone(),
                columns: 0,
            },
            ProbeEvent::ColumnsEnumerated {
                table: table.clone(),
                columns: 3,
            },
            ProbeEvent::EnumerationFailed {
                table: table.clone(),
                error: "boom".to_string(),
            },
            ProbeEvent::ProbeStarted {
                table: table.clone(),
                column: "a".to_string(),
                query: "SELECT a".to_string(),
            },
            ProbeEvent::Probed(ProbeOutcome::success(table.clone(), "a")),
            ProbeEvent::Probed(outcome()),
            ProbeEvent::WouldProbe {
                table,
                column: "a".to_string(),
                query: "SELECT a".to_string(),
            },
        ];

        let reporter = TracingReporter;
        for event in &events {
            reporter.record(WorkerId(0), event);
        }
    }
}
