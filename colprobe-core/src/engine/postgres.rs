//! PostgreSQL engine backed by a sqlx connection pool.
//!
//! The catalog of the run maps onto the database name, so the metadata query
//! `"<db>".information_schema.columns` resolves against the connected
//! database. Every pooled session is forced read-only and carries a
//! server-side `statement_timeout` matching the per-query timeout.

use super::{Connection, ConnectionConfig, ConnectionPool, EngineResult};
use crate::Result;
use crate::error::{EngineError, ProbeError};
use crate::models::EngineKind;
use crate::security::Credentials;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, Postgres};

/// Connection pool for a PostgreSQL server.
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: PgPool,
    config: ConnectionConfig,
}

impl PostgresPool {
    /// Creates a lazily connecting pool.
    ///
    /// No connection is opened until the first acquire.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config.
    pub fn new(config: ConnectionConfig, credentials: &Credentials) -> Result<Self> {
        use sqlx::Executor;

        config.validate()?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.catalog)
            .username(credentials.username())
            .application_name(&format!("colprobe-{}", env!("CARGO_PKG_VERSION")));
        if let Some(password) = credentials.expose_password() {
            options = options.password(password);
        }

        let statement_timeout_ms = config.query_timeout.as_millis();

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .min_connections(0)
            .acquire_timeout(config.acquire_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = '{statement_timeout_ms}ms'").as_str(),
                    )
                    .await?;
                    conn.execute("SET default_transaction_read_only = on")
                        .await?;
                    Ok(())
                })
            })
            .connect_lazy_with(options);

        Ok(Self { pool, config })
    }
}

#[async_trait]
impl ConnectionPool for PostgresPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        let conn = self.pool.acquire().await.map_err(|e| match e {
            sqlx::Error::PoolTimedOut => {
                ProbeError::connection_timeout(self.describe(), self.config.acquire_timeout)
            }
            other => ProbeError::connection_failed(format!("Cannot connect to {}", self.describe()), other),
        })?;
        Ok(Box::new(PostgresConnection { conn }))
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.config.pool_size).unwrap_or(usize::MAX)
    }

    fn describe(&self) -> String {
        self.config.to_string()
    }

    fn engine(&self) -> EngineKind {
        EngineKind::PostgreSQL
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A connection checked out of a [`PostgresPool`].
#[derive(Debug)]
pub struct PostgresConnection {
    conn: PoolConnection<Postgres>,
}

fn engine_error(error: sqlx::Error) -> EngineError {
    match error {
        sqlx::Error::Database(db) => EngineError::query(db.message()),
        other => EngineError::transport(other.to_string()),
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn fetch_column(&mut self, sql: &str) -> EngineResult<Vec<String>> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(engine_error)?;

        // information_schema columns are `sql_identifier`, a domain over a
        // text type, which the checked decoder refuses.
        rows.iter()
            .map(|row| row.try_get_unchecked::<String, _>(0).map_err(engine_error))
            .collect()
    }

    async fn execute(&mut self, sql: &str) -> EngineResult<u64> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(engine_error)?;
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }
}
