//! Column enumeration and probing.
//!
//! Both operations catch every engine error they run into. A failure here
//! only ever costs the table (enumeration) or the column (probe) it happened
//! on; it is reported and the caller moves on.

use crate::engine::{Connection, EngineResult};
use crate::error::EngineError;
use crate::models::{ProbeEvent, ProbeOutcome, TableRef, WorkerId};
use crate::reporter::Reporter;
use std::future::Future;
use std::time::Duration;

/// Whether probe queries are sent to the engine or only reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Run every probe query against the engine
    #[default]
    Live,
    /// Enumerate columns but only report the probe queries that would run
    DryRun,
}

/// Quotes an SQL identifier, doubling embedded double quotes.
///
/// ```rust
/// use colprobe_core::probe::quote_identifier;
///
/// assert_eq!(quote_identifier("order date"), "\"order date\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Metadata query listing the columns of `table` in declaration order.
pub fn metadata_query(table: &TableRef) -> String {
    format!(
        "SELECT column_name FROM {}.information_schema.columns \
         WHERE table_schema = {} AND table_name = {} ORDER BY ordinal_position",
        quote_identifier(&table.catalog),
        quote_literal(&table.schema),
        quote_literal(&table.table),
    )
}

/// Minimal one-row read of a single column.
pub fn probe_query(table: &TableRef, column: &str) -> String {
    format!(
        "SELECT {} FROM {}.{}.{} LIMIT 1",
        quote_identifier(column),
        quote_identifier(&table.catalog),
        quote_identifier(&table.schema),
        quote_identifier(&table.table),
    )
}

async fn bounded<T>(limit: Duration, query: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout { after: limit }),
    }
}

/// Per-worker context shared by enumeration and probing.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    /// Worker issuing the queries
    pub worker: WorkerId,
    /// Where events go
    pub reporter: &'a dyn Reporter,
    /// Bound on each query
    pub query_timeout: Duration,
}

impl ProbeContext<'_> {
    fn report(&self, event: ProbeEvent) {
        self.reporter.record(self.worker, &event);
    }
}

/// Lists the columns of `table` in the engine's order.
///
/// The failure has already been reported when `Err` comes back; callers only
/// need to skip the table.
///
/// # Errors
/// Returns the engine error (or timeout) of the metadata query.
pub async fn enumerate_columns(
    conn: &mut dyn Connection,
    table: &TableRef,
    ctx: ProbeContext<'_>,
) -> EngineResult<Vec<String>> {
    let query = metadata_query(table);
    ctx.report(ProbeEvent::EnumerationStarted {
        table: table.clone(),
        query: query.clone(),
    });

    match bounded(ctx.query_timeout, conn.fetch_column(&query)).await {
        Ok(columns) => {
            ctx.report(ProbeEvent::ColumnsEnumerated {
                table: table.clone(),
                columns: columns.len(),
            });
            Ok(columns)
        }
        Err(error) => {
            ctx.report(ProbeEvent::EnumerationFailed {
                table: table.clone(),
                error: error.to_string(),
            });
            Err(error)
        }
    }
}

/// Runs the probe query for one column and reports the outcome.
///
/// Exactly one attempt is made. Any error, including a timeout, becomes a
/// [`Failure`](crate::models::ProbeStatus::Failure) carrying the error text.
pub async fn probe_column(
    conn: &mut dyn Connection,
    table: &TableRef,
    column: &str,
    ctx: ProbeContext<'_>,
) -> ProbeOutcome {
    let query = probe_query(table, column);
    ctx.report(ProbeEvent::ProbeStarted {
        table: table.clone(),
        column: column.to_string(),
        query: query.clone(),
    });

    let outcome = match bounded(ctx.query_timeout, conn.execute(&query)).await {
        Ok(_) => ProbeOutcome::success(table.clone(), column),
        Err(error) => ProbeOutcome::failure(table.clone(), column, error.to_string()),
    };

    ctx.report(ProbeEvent::Probed(outcome.clone()));
    outcome
}

/// Reports the probe query for `column` without running it.
pub fn report_would_probe(table: &TableRef, column: &str, ctx: ProbeContext<'_>) -> String {
    let query = probe_query(table, column);
    ctx.report(ProbeEvent::WouldProbe {
        table: table.clone(),
        column: column.to_string(),
        query: query.clone(),
    });
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeStatus, WorkItem};
    use crate::reporter::CollectingReporter;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Replays canned answers in order and records every statement.
    #[derive(Default)]
    struct Scripted {
        answers: VecDeque<EngineResult<Vec<String>>>,
        statements: Vec<String>,
        stall: bool,
    }

    #[async_trait]
    impl Connection for Scripted {
        async fn fetch_column(&mut self, sql: &str) -> EngineResult<Vec<String>> {
            self.statements.push(sql.to_string());
            if self.stall {
                std::future::pending::<()>().await;
            }
            self.answers.pop_front().unwrap_or(Ok(Vec::new()))
        }

        async fn execute(&mut self, sql: &str) -> EngineResult<u64> {
            self.fetch_column(sql).await.map(|rows| rows.len() as u64)
        }
    }

    fn table() -> TableRef {
        WorkItem::new("sales", "orders").in_catalog("hive")
    }

    fn ctx(reporter: &CollectingReporter) -> ProbeContext<'_> {
        ProbeContext {
            worker: WorkerId(0),
            reporter,
            query_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_metadata_query_text() {
        assert_eq!(
            metadata_query(&table()),
            "SELECT column_name FROM \"hive\".information_schema.columns \
             WHERE table_schema = 'sales' AND table_name = 'orders' ORDER BY ordinal_position"
        );
    }

    #[test]
    fn test_metadata_query_escapes_literals() {
        let table = WorkItem::new("o'brien", "t").in_catalog("hive");
        assert!(metadata_query(&table).contains("table_schema = 'o''brien'"));
    }

    #[test]
    fn test_probe_query_text() {
        assert_eq!(
            probe_query(&table(), "amount"),
            "SELECT \"amount\" FROM \"hive\".\"sales\".\"orders\" LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_enumerate_columns_keeps_engine_order() {
        let reporter = CollectingReporter::new();
        let mut conn = Scripted {
            answers: VecDeque::from([Ok(vec!["z".into(), "a".into(), "m".into()])]),
            ..Default::default()
        };

        let columns = enumerate_columns(&mut conn, &table(), ctx(&reporter)).await.unwrap();

        assert_eq!(columns, vec!["z", "a", "m"]);
        assert_eq!(conn.statements, vec![metadata_query(&table())]);
        assert!(reporter.events().iter().any(|(_, e)| matches!(
            e,
            ProbeEvent::ColumnsEnumerated { columns: 3, .. }
        )));
    }

    #[tokio::test]
    async fn test_enumerate_columns_reports_failure() {
        let reporter = CollectingReporter::new();
        let mut conn = Scripted {
            answers: VecDeque::from([Err(EngineError::query("Schema 'sales' does not exist"))]),
            ..Default::default()
        };

        let result = enumerate_columns(&mut conn, &table(), ctx(&reporter)).await;

        assert!(result.is_err());
        let events = reporter.into_events();
        assert_eq!(
            events.last().map(|(_, e)| e.clone()),
            Some(ProbeEvent::EnumerationFailed {
                table: table(),
                error: "Schema 'sales' does not exist".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_probe_column_success_and_failure() {
        let reporter = CollectingReporter::new();
        let mut conn = Scripted {
            answers: VecDeque::from([
                Ok(vec!["1".into()]),
                Err(EngineError::query("Cannot cast 'abc' to INT")),
            ]),
            ..Default::default()
        };

        let ok = probe_column(&mut conn, &table(), "id", ctx(&reporter)).await;
        let failed = probe_column(&mut conn, &table(), "qty", ctx(&reporter)).await;

        assert_eq!(ok.status, ProbeStatus::Success);
        assert_eq!(failed.status, ProbeStatus::Failure);
        assert_eq!(failed.detail.as_deref(), Some("Cannot cast 'abc' to INT"));
        assert_eq!(conn.statements.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_is_failure() {
        let reporter = CollectingReporter::new();
        let mut conn = Scripted {
            stall: true,
            ..Default::default()
        };

        let outcome = probe_column(&mut conn, &table(), "payload", ctx(&reporter)).await;

        assert!(outcome.is_failure());
        assert_eq!(outcome.detail.as_deref(), Some("query timed out after 5s"));
    }

    #[test]
    fn test_report_would_probe() {
        let reporter = CollectingReporter::new();
        let query = report_would_probe(&table(), "amount", ctx(&reporter));

        assert_eq!(query, probe_query(&table(), "amount"));
        assert_eq!(
            reporter.into_events(),
            vec![(
                WorkerId(0),
                ProbeEvent::WouldProbe {
                    table: table(),
                    column: "amount".to_string(),
                    query,
                }
            )]
        );
    }
}
