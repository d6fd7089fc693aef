//! Core engine for colprobe.
//!
//! Given a list of `(schema, table)` pairs, colprobe lists every column of
//! every table and runs a one-row read against each column individually.
//! Columns whose stored values cannot be coerced to their declared type fail
//! that read; the failure is reported with full
//! `catalog.schema.table.column` context and the run carries on.
//!
//! # Security Guarantees
//! - Passwords are never logged and are zeroed on drop
//! - Only `information_schema` lookups and `SELECT ... LIMIT 1` reads are issued
//! - PostgreSQL sessions are forced read-only
//!
//! # Architecture
//! - [`worklist`] loads and validates the CSV work list
//! - [`partition`] splits it into balanced per-worker chunks
//! - [`orchestrator`] runs one [`worker`] per chunk as a tokio task
//! - [`probe`] holds the enumerator and prober each worker drives
//! - [`engine`] abstracts the query engine behind `ConnectionPool`
//! - [`reporter`] turns every action into a log entry

pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod partition;
pub mod probe;
pub mod reporter;
pub mod security;
pub mod worker;
pub mod worklist;

// Re-export commonly used types
pub use engine::{Connection, ConnectionConfig, ConnectionPool, HttpScheme};
pub use error::{EngineError, ProbeError, Result};
pub use logging::{LogFormat, LoggingConfig};
pub use models::{
    EngineKind, ProbeEvent, ProbeOutcome, ProbeStatus, TableRef, WorkItem, WorkerId,
    WorkerOutcome,
};
pub use orchestrator::{ProbeRunConfig, RunOutcome};
pub use probe::ProbeMode;
pub use reporter::{CollectingReporter, Reporter, TracingReporter};
pub use security::Credentials;
