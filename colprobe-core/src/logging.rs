//! Logging setup for the colprobe binary.
//!
//! The log stream is the only durable artifact of a probe run, so the sink
//! can be redirected to a file and switched to JSON lines for later scanning.

use crate::Result;
use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line records
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected text or json)")),
        }
    }
}

/// Logging configuration assembled from command line flags.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
    pub verbose: u8,
    /// Only show ERROR level logs
    pub quiet: bool,
    /// Output format
    pub format: LogFormat,
    /// Append log records to this file instead of stderr
    pub file: Option<PathBuf>,
}

/// Maps verbosity flags to a maximum level.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging.
///
/// `RUST_LOG`, when set, overrides the level derived from the flags.
///
/// # Errors
/// Returns a configuration error if the log file cannot be opened or a
/// global subscriber is already installed.
///
/// # Example
/// ```rust,no_run
/// use colprobe_core::logging::{LoggingConfig, init_logging};
///
/// init_logging(&LoggingConfig { verbose: 1, ..Default::default() })
///     .expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = level_for(config.verbose, config.quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let init_result = match (&config.file, config.format) {
        (None, LogFormat::Text) => builder.with_writer(std::io::stderr).try_init(),
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).try_init(),
        (Some(path), format) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ProbeError::Io {
                    context: format!("Failed to open log file {}", path.display()),
                    source: e,
                })?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Text => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
    };

    init_result.map_err(|e| {
        ProbeError::configuration(format!("Failed to initialize logging: {e}"))
    })?;

    Ok(())
}
