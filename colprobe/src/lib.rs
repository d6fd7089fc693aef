//! Command line front end for colprobe.
//!
//! Argument parsing, interactive prompts and connection resolution live here
//! so they can be tested without a terminal; `main.rs` only wires them to the
//! core library.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colprobe_core::engine::{
    ConnectionConfig, ConnectionPool, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_POOL_SIZE,
    DEFAULT_QUERY_TIMEOUT, HttpScheme,
};
use colprobe_core::orchestrator::{
    self, DEFAULT_WORKERS, ProbeRunConfig, RunOutcome, effective_workers,
};
use colprobe_core::partition::partition;
use colprobe_core::worklist::load_work_list;
use colprobe_core::{
    Credentials, EngineKind, LogFormat, LoggingConfig, ProbeMode, Reporter, WorkItem,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Environment variable holding the engine password
pub const PASSWORD_ENV: &str = "COLPROBE_PASSWORD";

/// CLI argument structure
#[derive(Debug, Parser)]
#[command(name = "colprobe")]
#[command(about = "Find columns whose stored values cannot be read as their declared type")]
#[command(version)]
#[command(long_about = "
colprobe - column coercion probe for SQL query engines

For every (schema, table) in a CSV work list, colprobe lists the table's
columns and reads one row of each column on its own. A column that fails to
read is logged with the engine's error message; the run then moves on.

The work list has a header row and exactly two fields per row:

  schema,table
  sales,orders
  sales,refunds

SECURITY:
- Only information_schema lookups and SELECT ... LIMIT 1 reads are issued
- The password is read from COLPROBE_PASSWORD or a no-echo prompt, never a flag
- Credentials never appear in logs

EXAMPLES:
  colprobe check --work-list tables.csv --workers 8
  colprobe run --work-list tables.csv --host trino.internal --port 8443 --catalog hive --user analyst
  colprobe run --dry-run --work-list tables.csv
  COLPROBE_ENGINE=postgres colprobe test --host db --port 5432 --catalog analytics --user audit
")]
pub struct Cli {
    /// Flags accepted by every subcommand
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Probe every column of every table in the work list
    Run(RunArgs),
    /// Check that the engine is reachable with the given connection settings
    Test(TestArgs),
    /// Validate the work list and show how it would be split between workers
    Check(CheckArgs),
}

/// Arguments of `run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// CSV file of schema,table rows
    #[arg(long, value_name = "FILE")]
    pub work_list: PathBuf,

    /// List columns and log the probe queries without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, value_parser = parse_workers)]
    pub workers: usize,

    /// Where and how to connect
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Arguments of `test`
#[derive(Debug, Args)]
pub struct TestArgs {
    /// Where and how to connect
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Arguments of `check`
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// CSV file of schema,table rows
    #[arg(long, value_name = "FILE")]
    pub work_list: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = DEFAULT_WORKERS, value_parser = parse_workers)]
    pub workers: usize,

    /// Connection pool size the run will use
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: u32,
}

/// Engine connection settings. Anything missing is prompted for.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// Query engine
    #[arg(long, env = "COLPROBE_ENGINE", default_value = "trino")]
    pub engine: EngineKind,

    /// Coordinator or server host (prompted for if missing)
    #[arg(long, env = "COLPROBE_HOST")]
    pub host: Option<String>,

    /// Coordinator or server port (prompted for if missing)
    #[arg(long, env = "COLPROBE_PORT")]
    pub port: Option<u16>,

    /// Catalog to probe; the database name for PostgreSQL (prompted for if missing)
    #[arg(long, env = "COLPROBE_CATALOG")]
    pub catalog: Option<String>,

    /// User name (prompted for if missing)
    #[arg(long, env = "COLPROBE_USER")]
    pub user: Option<String>,

    /// Scheme for HTTP-based engines
    #[arg(long, default_value = "https")]
    pub http_scheme: HttpScheme,

    /// Accept any TLS certificate from the engine
    #[arg(long)]
    pub insecure_skip_tls_verify: bool,

    /// Maximum number of open connections
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: u32,

    /// Seconds to wait for a connection
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_secs())]
    pub acquire_timeout: u64,

    /// Seconds before a single metadata or probe query is abandoned
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_QUERY_TIMEOUT.as_secs())]
    pub query_timeout: u64,
}

/// Logging flags
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Only log errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalArgs {
    /// Logging settings for these flags
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            verbose: self.verbose,
            quiet: self.quiet,
            format: self.log_format,
            file: self.log_file.clone(),
        }
    }
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("workers must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(format!("invalid worker count: {e}")),
    }
}

/// Parses a port answered at the prompt.
pub fn parse_port(value: &str) -> anyhow::Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => bail!("port must be a number between 1 and 65535"),
    }
}

/// Source of answers for missing connection settings.
pub trait Prompter {
    /// Asks for a visible value.
    fn ask(&mut self, label: &str) -> io::Result<String>;
    /// Asks for a value without echoing it.
    fn ask_secret(&mut self, label: &str) -> io::Result<String>;
}

/// Prompts on the terminal. Prompts go to stderr so stdout stays clean.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, label: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{label}: ")?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }

    fn ask_secret(&mut self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(format!("{label}: "))
    }
}

fn required(
    value: Option<&str>,
    field: &str,
    label: &str,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<String> {
    let value = match value {
        Some(v) => v.to_string(),
        None => prompter
            .ask(label)
            .with_context(|| format!("Failed to read {field}"))?,
    };
    let value = value.trim();
    if value.is_empty() {
        bail!("{field} cannot be blank");
    }
    Ok(value.to_string())
}

/// Builds the engine config and credentials, prompting for anything missing.
///
/// `password` is the value of [`PASSWORD_ENV`], if set. Without it the
/// password is prompted for without echo; a blank answer means no password.
///
/// # Errors
/// Fails if a required value is blank, the port is invalid, a prompt cannot
/// be read, or the resulting config does not validate.
pub fn resolve_connection(
    args: &ConnectionArgs,
    password: Option<String>,
    prompter: &mut dyn Prompter,
) -> anyhow::Result<(ConnectionConfig, Credentials)> {
    let host = required(args.host.as_deref(), "host", "Host", prompter)?;
    let port = match args.port {
        Some(port) => port,
        None => parse_port(&prompter.ask("Port").context("Failed to read port")?)?,
    };
    let catalog = required(args.catalog.as_deref(), "catalog", "Catalog", prompter)?;
    let user = required(args.user.as_deref(), "user", "Username", prompter)?;

    let password = match password {
        Some(p) => p,
        None => prompter
            .ask_secret("Password (blank for none)")
            .context("Failed to read password")?,
    };
    let password = (!password.is_empty()).then_some(password);

    let config = ConnectionConfig::new(args.engine, host, port, catalog)
        .with_http_scheme(args.http_scheme)
        .with_verify_tls(!args.insecure_skip_tls_verify)
        .with_pool_size(args.pool_size)
        .with_acquire_timeout(Duration::from_secs(args.acquire_timeout))
        .with_query_timeout(Duration::from_secs(args.query_timeout));
    config.validate()?;

    Ok((config, Credentials::new(user, password)))
}

/// One line per worker describing the chunk it would get.
pub fn plan_lines(items: &[WorkItem], workers: usize, pool_size: u32) -> Vec<String> {
    let capacity = usize::try_from(pool_size).unwrap_or(usize::MAX);
    let workers = effective_workers(workers, items.len(), capacity);

    partition(items, workers)
        .iter()
        .enumerate()
        .map(|(index, chunk)| match (chunk.first(), chunk.last()) {
            (Some(first), Some(last)) if chunk.len() > 1 => {
                format!("worker-{index}: {} table(s), {first} .. {last}", chunk.len())
            }
            (Some(first), _) => format!("worker-{index}: 1 table(s), {first}"),
            _ => format!("worker-{index}: 0 table(s)"),
        })
        .collect()
}

/// Closing line printed after a run. Probe results are in the log only.
pub fn completion_line(outcome: &RunOutcome, mode: ProbeMode) -> String {
    let verb = match mode {
        ProbeMode::Live => "Run",
        ProbeMode::DryRun => "Dry run",
    };
    format!(
        "{verb} {} finished: {} table(s) with {} worker(s); see the log for per-column results",
        outcome.run_id,
        outcome.tables(),
        outcome.workers.len()
    )
}

/// Loads the work list, resolves the connection and probes every table.
///
/// The work list is read and validated first. A rejected file fails before
/// anything is prompted for and before `connect` is called. The pool is
/// closed once the run ends, whether or not it succeeded.
///
/// # Errors
/// Fails on a rejected work list, unusable connection settings, a pool that
/// cannot be built, or a fatal worker error.
pub async fn run<F>(
    args: &RunArgs,
    password: Option<String>,
    prompter: &mut dyn Prompter,
    connect: F,
    reporter: Arc<dyn Reporter>,
) -> anyhow::Result<RunOutcome>
where
    F: FnOnce(&ConnectionConfig, Credentials) -> colprobe_core::Result<Arc<dyn ConnectionPool>>,
{
    let items = load_work_list(&args.work_list)
        .with_context(|| format!("Cannot use work list {}", args.work_list.display()))?;
    info!(
        "Loaded {} table(s) from {}",
        items.len(),
        args.work_list.display()
    );

    let (config, credentials) = resolve_connection(&args.connection, password, prompter)?;
    let mode = if args.dry_run {
        ProbeMode::DryRun
    } else {
        ProbeMode::Live
    };
    let run_config = ProbeRunConfig::new(config.catalog.clone())
        .with_workers(args.workers)
        .with_mode(mode)
        .with_query_timeout(config.query_timeout);

    let pool = connect(&config, credentials)?;
    info!("Target: {} ({})", pool.describe(), pool.engine());

    let result = orchestrator::run(items, &run_config, Arc::clone(&pool), reporter).await;
    pool.close().await;
    Ok(result?)
}
