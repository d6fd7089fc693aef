//! Trino client over the HTTP statement protocol.
//!
//! A statement is submitted with `POST /v1/statement` and its results are
//! paged by following `nextUri` until the server stops returning one. Errors
//! arrive inside an otherwise successful response as an `error` object; its
//! `message` is what the user sees in the log.
//!
//! HTTP is stateless, so a "connection" here is a slot in a semaphore sized
//! to the configured pool capacity plus a handle to the shared HTTP client.
//! Holding a [`TrinoConnection`] is what bounds concurrency against the
//! coordinator.

use super::{Connection, ConnectionConfig, ConnectionPool, EngineResult};
use crate::Result;
use crate::error::{EngineError, ProbeError};
use crate::models::EngineKind;
use crate::security::Credentials;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

const HEADER_USER: &str = "X-Trino-User";
const HEADER_CATALOG: &str = "X-Trino-Catalog";
const HEADER_SOURCE: &str = "X-Trino-Source";
const SOURCE: &str = "colprobe";

/// One page of statement results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    id: String,
    next_uri: Option<String>,
    data: Option<Vec<Vec<serde_json::Value>>>,
    error: Option<QueryError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    message: String,
    error_name: Option<String>,
}

/// Subset of `GET /v1/info`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    node_version: NodeVersion,
    #[serde(default)]
    starting: bool,
}

#[derive(Debug, Deserialize)]
struct NodeVersion {
    version: String,
}

/// Connection pool for a Trino coordinator.
pub struct TrinoPool {
    client: Client,
    base_url: Url,
    config: ConnectionConfig,
    credentials: Arc<Credentials>,
    slots: Arc<Semaphore>,
}

impl std::fmt::Debug for TrinoPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrinoPool")
            .field("config", &self.config)
            .field("available", &self.slots.available_permits())
            .finish()
    }
}

impl TrinoPool {
    /// Creates a pool for the coordinator described by `config`.
    ///
    /// No request is sent until the first [`acquire`](ConnectionPool::acquire).
    ///
    /// # Errors
    /// Returns a configuration error for an invalid config, or a connection
    /// error if the HTTP client cannot be built.
    pub fn new(config: ConnectionConfig, credentials: Credentials) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&format!(
            "{}://{}:{}/",
            config.http_scheme, config.host, config.port
        ))
        .map_err(|e| ProbeError::configuration(format!("Invalid Trino endpoint: {e}")))?;

        if !config.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for {}", base_url);
        }

        let client = Client::builder()
            .connect_timeout(config.acquire_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(format!("{SOURCE}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::connection_failed("Failed to build Trino HTTP client", e))?;

        let capacity = usize::try_from(config.pool_size).unwrap_or(usize::MAX);

        Ok(Self {
            client,
            base_url,
            config,
            credentials: Arc::new(credentials),
            slots: Arc::new(Semaphore::new(capacity)),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ProbeError::configuration(format!("Invalid Trino endpoint: {e}")))
    }

    /// Verifies the coordinator is reachable and has finished starting.
    async fn check_server(&self) -> Result<()> {
        let url = self.endpoint("v1/info")?;
        let response = self
            .client
            .get(url)
            .timeout(self.config.acquire_timeout)
            .send()
            .await
            .map_err(|e| {
                ProbeError::connection_failed(format!("Cannot reach {}", self.describe()), e)
            })?
            .error_for_status()
            .map_err(|e| {
                ProbeError::connection_failed(format!("{} rejected the request", self.describe()), e)
            })?;

        let info: ServerInfo = response.json().await.map_err(|e| {
            ProbeError::connection_failed(
                format!("Unexpected server info from {}", self.describe()),
                e,
            )
        })?;

        if info.starting {
            return Err(ProbeError::connection_failed(
                format!("{} is still starting", self.describe()),
                std::io::Error::other("coordinator not ready"),
            ));
        }

        tracing::debug!(
            "Connected to Trino {} at {}",
            info.node_version.version,
            self.describe()
        );
        Ok(())
    }
}

#[async_trait]
impl ConnectionPool for TrinoPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        let permit = tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        .map_err(|_| ProbeError::connection_timeout(self.describe(), self.config.acquire_timeout))?
        .map_err(|e| ProbeError::connection_failed("Trino connection pool is closed", e))?;

        self.check_server().await?;

        Ok(Box::new(TrinoConnection {
            client: self.client.clone(),
            statement_url: self.endpoint("v1/statement")?,
            catalog: self.config.catalog.clone(),
            credentials: Arc::clone(&self.credentials),
            _slot: permit,
        }))
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.config.pool_size).unwrap_or(usize::MAX)
    }

    fn describe(&self) -> String {
        self.config.to_string()
    }

    fn engine(&self) -> EngineKind {
        EngineKind::Trino
    }

    async fn close(&self) {
        self.slots.close();
    }
}

/// A pooled Trino session slot.
pub struct TrinoConnection {
    client: Client,
    statement_url: Url,
    catalog: String,
    credentials: Arc<Credentials>,
    _slot: OwnedSemaphorePermit,
}

impl TrinoConnection {
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(HEADER_USER, self.credentials.username())
            .header(HEADER_SOURCE, SOURCE);
        match self.credentials.expose_password() {
            Some(password) => request.basic_auth(self.credentials.username(), Some(password)),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> EngineResult<QueryResults> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::transport(format!("HTTP {status}: {body}")));
        }

        response
            .json::<QueryResults>()
            .await
            .map_err(|e| EngineError::transport(format!("Malformed statement response: {e}")))
    }

    /// Submits `sql` and follows `nextUri` until the statement finishes.
    async fn run(&mut self, sql: &str) -> EngineResult<Vec<Vec<serde_json::Value>>> {
        let request = self
            .authorize(self.client.post(self.statement_url.clone()))
            .header(HEADER_CATALOG, &self.catalog)
            .body(sql.to_string());
        let mut page = Self::send(request).await?;
        tracing::trace!("Submitted Trino query {}", page.id);

        let mut rows = Vec::new();
        loop {
            if let Some(error) = page.error.take() {
                tracing::trace!(
                    "Trino query {} failed with {}",
                    page.id,
                    error.error_name.as_deref().unwrap_or("UNKNOWN")
                );
                return Err(EngineError::query(error.message));
            }
            if let Some(data) = page.data.take() {
                rows.extend(data);
            }
            match page.next_uri.take() {
                Some(next) => page = Self::send(self.authorize(self.client.get(next))).await?,
                None => break,
            }
        }

        Ok(rows)
    }
}

/// Renders a result cell as text.
fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl Connection for TrinoConnection {
    async fn fetch_column(&mut self, sql: &str) -> EngineResult<Vec<String>> {
        let rows = self.run(sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(cell_text)
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> EngineResult<u64> {
        let rows = self.run(sql).await?;
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }
}
