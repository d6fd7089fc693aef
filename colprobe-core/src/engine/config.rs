//! Query engine connection configuration.
//!
//! There are deliberately no defaults for where to connect: host, port and
//! catalog always come from the caller. Only the tunables (pool size,
//! timeouts, scheme) have defaults.

use crate::error::ProbeError;
use crate::models::EngineKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of pooled connections
pub const DEFAULT_POOL_SIZE: u32 = 10;
/// Upper bound on pooled connections
pub const MAX_POOL_SIZE: u32 = 100;
/// Default time to wait for a pooled connection
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default bound on a single probe or metadata query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(300);
/// Upper bound accepted for either timeout
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Transport scheme for HTTP-based engines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpScheme {
    Http,
    #[default]
    Https,
}

impl std::fmt::Display for HttpScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpScheme::Http => write!(f, "http"),
            HttpScheme::Https => write!(f, "https"),
        }
    }
}

impl std::str::FromStr for HttpScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unknown scheme '{other}' (expected http or https)")),
        }
    }
}

/// Configuration for query engine connections.
///
/// # Security
/// This struct does not store credentials; see
/// [`Credentials`](crate::security::Credentials).
///
/// # Example
/// ```rust
/// use colprobe_core::engine::ConnectionConfig;
/// use colprobe_core::models::EngineKind;
///
/// let config = ConnectionConfig::new(EngineKind::Trino, "trino.internal", 8443, "hive")
///     .with_pool_size(16);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Which engine client to use
    pub engine: EngineKind,
    /// Coordinator / server host
    pub host: String,
    /// Coordinator / server port
    pub port: u16,
    /// Catalog (Trino) or database (PostgreSQL) probed in this run
    pub catalog: String,
    /// HTTP scheme (Trino only)
    pub http_scheme: HttpScheme,
    /// Verify the server's TLS certificate
    pub verify_tls: bool,
    /// Maximum number of pooled connections
    pub pool_size: u32,
    /// Time to wait for a pooled connection before giving up
    pub acquire_timeout: Duration,
    /// Bound on each individual query
    pub query_timeout: Duration,
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.engine {
            EngineKind::Trino => write!(
                f,
                "trino {}://{}:{}/{}",
                self.http_scheme, self.host, self.port, self.catalog
            ),
            EngineKind::PostgreSQL => write!(
                f,
                "postgres://{}:{}/{}",
                self.host, self.port, self.catalog
            ),
        }
    }
}

impl ConnectionConfig {
    /// Creates a config for the given endpoint with default tunables.
    pub fn new(
        engine: EngineKind,
        host: impl Into<String>,
        port: u16,
        catalog: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            host: host.into(),
            port,
            catalog: catalog.into(),
            http_scheme: HttpScheme::default(),
            verify_tls: true,
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns a configuration error naming the first invalid value.
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.trim().is_empty() {
            return Err(ProbeError::configuration("host cannot be blank"));
        }

        if self.port == 0 {
            return Err(ProbeError::configuration("port must be greater than 0"));
        }

        if self.catalog.trim().is_empty() {
            return Err(ProbeError::configuration("catalog cannot be blank"));
        }

        if self.pool_size == 0 {
            return Err(ProbeError::configuration(
                "pool_size must be greater than 0",
            ));
        }

        if self.pool_size > MAX_POOL_SIZE {
            return Err(ProbeError::configuration(format!(
                "pool_size should not exceed {MAX_POOL_SIZE}"
            )));
        }

        for (name, timeout) in [
            ("acquire_timeout", self.acquire_timeout),
            ("query_timeout", self.query_timeout),
        ] {
            if timeout.is_zero() {
                return Err(ProbeError::configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
            if timeout > MAX_TIMEOUT {
                return Err(ProbeError::configuration(format!(
                    "{name} should not exceed {}s",
                    MAX_TIMEOUT.as_secs()
                )));
            }
        }

        Ok(())
    }

    /// Builder method to set the HTTP scheme.
    pub fn with_http_scheme(mut self, scheme: HttpScheme) -> Self {
        self.http_scheme = scheme;
        self
    }

    /// Builder method to toggle TLS certificate verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Builder method to set the pool size.
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Builder method to set the acquire timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Builder method to set the per-query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}
