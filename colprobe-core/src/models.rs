//! Core data models for a probe run.
//!
//! Work items come in from the work list, events go out to the reporter.
//! Nothing here is retained after it has been reported.

use serde::{Deserialize, Serialize};

/// Supported query engines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Trino / Starburst over the HTTP statement protocol
    #[default]
    Trino,
    /// PostgreSQL wire protocol
    #[serde(rename = "postgres")]
    PostgreSQL,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Trino => write!(f, "Trino"),
            EngineKind::PostgreSQL => write!(f, "PostgreSQL"),
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trino" | "starburst" => Ok(Self::Trino),
            "postgres" | "postgresql" => Ok(Self::PostgreSQL),
            other => Err(format!(
                "unsupported engine '{other}' (expected trino or postgres)"
            )),
        }
    }
}

/// One (schema, table) pair from the work list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkItem {
    pub schema: String,
    pub table: String,
}

impl WorkItem {
    /// Creates a work item.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Qualifies this item with the run's catalog.
    pub fn in_catalog(&self, catalog: &str) -> TableRef {
        TableRef {
            catalog: catalog.to_string(),
            schema: self.schema.clone(),
            table: self.table.clone(),
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Fully qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

/// Identity of a worker within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Result of a single column probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// The probe query executed
    Success,
    /// The engine raised an error (or the probe timed out)
    Failure,
}

/// Outcome of probing one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub table: TableRef,
    pub column: String,
    pub status: ProbeStatus,
    /// Engine error message, verbatim, on failure
    pub detail: Option<String>,
}

impl ProbeOutcome {
    /// Successful probe
    pub fn success(table: TableRef, column: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
            status: ProbeStatus::Success,
            detail: None,
        }
    }

    /// Failed probe with the engine's message
    pub fn failure(table: TableRef, column: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            table,
            column: column.into(),
            status: ProbeStatus::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ProbeStatus::Failure
    }
}

/// Everything a worker reports while draining its chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeEvent {
    /// The worker took its connection from the pool
    ConnectionAcquired { pool: String },
    /// Metadata query is about to run
    EnumerationStarted { table: TableRef, query: String },
    /// Metadata query returned; `columns` may be zero
    ColumnsEnumerated { table: TableRef, columns: usize },
    /// Metadata query failed; the table is skipped
    EnumerationFailed { table: TableRef, error: String },
    /// Live probe query is about to run
    ProbeStarted {
        table: TableRef,
        column: String,
        query: String,
    },
    /// Live probe finished
    Probed(ProbeOutcome),
    /// Dry run: the probe query that would have been executed
    WouldProbe {
        table: TableRef,
        column: String,
        query: String,
    },
}

/// What a worker hands back to the orchestrator after draining its chunk.
///
/// Probe results are not in here; they only exist as reporter events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub worker: WorkerId,
    /// Number of work items drained
    pub tables: usize,
}

impl WorkerOutcome {
    /// A worker that has not drained anything yet
    pub fn new(worker: WorkerId) -> Self {
        Self { worker, tables: 0 }
    }
}
