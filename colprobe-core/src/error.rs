//! Error types for probe runs and engine queries.
//!
//! Two families live here. [`ProbeError`] is the run-level error: anything
//! that reaches it is fatal to the run. [`EngineError`] is what a single
//! query against the engine can fail with; the enumerator and prober catch it
//! and turn it into a log entry instead of propagating it.

use std::time::Duration;
use thiserror::Error;

/// Main error type for colprobe operations.
///
/// # Security
/// Messages never include passwords. Endpoints are described through
/// [`ConnectionPool::describe`](crate::engine::ConnectionPool::describe),
/// which has no credential in it.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection pool construction or connection acquisition failed
    #[error("Connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Connection acquisition did not complete within the configured timeout
    #[error("Timed out after {}s acquiring a connection from {pool}", timeout.as_secs())]
    ConnectionTimeout { pool: String, timeout: Duration },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The work list file was rejected
    #[error("Invalid work list: {message}")]
    WorkList { message: String },

    /// A worker terminated abnormally (panic or cancellation)
    #[error("Worker {worker} terminated abnormally: {message}")]
    Worker { worker: String, message: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding failed
    #[error("CSV parsing failed: {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
}

/// Convenience type alias for Results with ProbeError
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Failure of a single statement executed against the query engine.
///
/// The engine's own message is kept verbatim; the prober reports it as-is and
/// does not distinguish between variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine rejected or failed the statement
    #[error("{message}")]
    Query { message: String },

    /// The statement did not finish within the per-query timeout
    #[error("query timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    /// The request never produced an engine answer (network, protocol, decode)
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl EngineError {
    /// Creates a query error carrying the engine's message
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Creates a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl ProbeError {
    /// Creates a connection error with context
    pub fn connection_failed<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates a connection timeout error
    pub fn connection_timeout(pool: impl Into<String>, timeout: Duration) -> Self {
        Self::ConnectionTimeout {
            pool: pool.into(),
            timeout,
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a work list rejection
    pub fn work_list(message: impl Into<String>) -> Self {
        Self::WorkList {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_keeps_message_verbatim() {
        let error = EngineError::query("Cannot cast 'abc' to INT");
        assert_eq!(error.to_string(), "Cannot cast 'abc' to INT");

        let error = EngineError::Timeout {
            after: Duration::from_secs(5),
        };
        assert_eq!(error.to_string(), "query timed out after 5s");
    }

    #[test]
    fn test_error_creation() {
        let error = ProbeError::configuration("workers must be at least 1");
        assert!(error.to_string().contains("workers must be at least 1"));

        let error = ProbeError::connection_timeout("trino://lake:8443", Duration::from_secs(30));
        assert!(error.to_string().contains("30s"));
        assert!(error.to_string().contains("trino://lake:8443"));

        let error = ProbeError::work_list("line 3 has 3 fields, expected 2");
        assert!(error.to_string().starts_with("Invalid work list"));
    }
}
