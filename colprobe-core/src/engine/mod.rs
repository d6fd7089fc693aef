//! Query engine capability used by the probing core.
//!
//! The core only needs two things from an engine: a pool that hands out
//! exclusively owned connections, and connections that can run a statement.
//! Both traits are object safe so the orchestrator works with
//! `Arc<dyn ConnectionPool>` regardless of which engine is behind it.
//!
//! # Module Structure
//! - `config`: endpoint and tunables shared by all engines
//! - `trino`: Trino HTTP statement protocol client (feature `trino`)
//! - `postgres`: PostgreSQL wire protocol via sqlx (feature `postgresql`)

mod config;

#[cfg(feature = "postgresql")]
pub mod postgres;
#[cfg(feature = "trino")]
pub mod trino;

pub use config::{
    ConnectionConfig, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POOL_SIZE, DEFAULT_QUERY_TIMEOUT,
    HttpScheme, MAX_POOL_SIZE,
};

use crate::Result;
use crate::error::EngineError;
use crate::models::EngineKind;
use crate::security::Credentials;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a single statement.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A shared pool of engine connections.
///
/// # Object Safety
/// This trait is object-safe, allowing dynamic dispatch through
/// `Arc<dyn ConnectionPool>`.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Takes a connection out of the pool.
    ///
    /// Blocks while the pool is exhausted, at most for the configured
    /// acquire timeout. The connection goes back to the pool when dropped.
    ///
    /// # Errors
    /// Returns [`ProbeError::ConnectionTimeout`](crate::ProbeError::ConnectionTimeout)
    /// if no connection became available in time, or
    /// [`ProbeError::Connection`](crate::ProbeError::Connection) if the
    /// engine could not be reached.
    async fn acquire(&self) -> Result<Box<dyn Connection>>;

    /// Maximum number of connections that can be out at once
    fn capacity(&self) -> usize;

    /// Credential-free description of the endpoint, for logs
    fn describe(&self) -> String;

    /// Engine behind this pool
    fn engine(&self) -> EngineKind;

    /// Stops handing out connections and waits for checked-out ones to come
    /// back. Acquiring after this fails.
    async fn close(&self) {}
}

/// A single engine connection, exclusively owned by one worker.
///
/// Every method takes `&mut self`: a connection is never used by two
/// statements at once.
#[async_trait]
pub trait Connection: Send {
    /// Runs `sql` and returns the first column of every row as text.
    async fn fetch_column(&mut self, sql: &str) -> EngineResult<Vec<String>>;

    /// Runs `sql` to completion, discarding the rows, and returns how many
    /// rows were produced.
    async fn execute(&mut self, sql: &str) -> EngineResult<u64>;
}

/// Builds a connection pool for the configured engine.
///
/// # Errors
/// Returns a configuration error if the config is invalid or the engine was
/// not compiled in, or a connection error if the client cannot be built.
///
/// # Example
/// ```rust,no_run
/// use colprobe_core::engine::{ConnectionConfig, connect};
/// use colprobe_core::models::EngineKind;
/// use colprobe_core::security::Credentials;
///
/// # async fn example() -> colprobe_core::Result<()> {
/// let config = ConnectionConfig::new(EngineKind::Trino, "trino.internal", 8443, "hive");
/// let pool = connect(&config, Credentials::new("analyst".into(), None))?;
/// let mut conn = pool.acquire().await?;
/// # Ok(())
/// # }
/// ```
pub fn connect(config: &ConnectionConfig, credentials: Credentials) -> Result<Arc<dyn ConnectionPool>> {
    config.validate()?;

    match config.engine {
        #[cfg(feature = "trino")]
        EngineKind::Trino => Ok(Arc::new(trino::TrinoPool::new(
            config.clone(),
            credentials,
        )?)),
        #[cfg(not(feature = "trino"))]
        EngineKind::Trino => {
            drop(credentials);
            Err(crate::ProbeError::configuration(
                "Trino support not compiled in. Use --features trino",
            ))
        }
        #[cfg(feature = "postgresql")]
        EngineKind::PostgreSQL => Ok(Arc::new(postgres::PostgresPool::new(
            config.clone(),
            &credentials,
        )?)),
        #[cfg(not(feature = "postgresql"))]
        EngineKind::PostgreSQL => {
            drop(credentials);
            Err(crate::ProbeError::configuration(
                "PostgreSQL support not compiled in. Use --features postgresql",
            ))
        }
    }
}

/// Checks that a connection can be acquired and a trivial statement runs.
///
/// # Errors
/// Returns the acquisition error, or a connection error wrapping the
/// engine's message if `SELECT 1` fails.
pub async fn test_connection(pool: &dyn ConnectionPool) -> Result<()> {
    let mut connection = pool.acquire().await?;
    connection.execute("SELECT 1").await.map_err(|e| {
        crate::ProbeError::connection_failed(
            format!("Test query against {} failed", pool.describe()),
            e,
        )
    })?;
    Ok(())
}
