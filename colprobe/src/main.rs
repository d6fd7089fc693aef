//! colprobe binary.
//!
//! Loads the work list, resolves connection settings (prompting for what is
//! missing), and hands both to the core orchestrator. Per-column results go
//! to the log; stdout only gets the final summary.
//!
//! # Exit Status
//! Zero when the run completed, even if columns failed to read. Non-zero for
//! a rejected work list, invalid settings, or a connection that could not be
//! established.

use anyhow::{Context, Result};
use clap::Parser;
use colprobe::{
    CheckArgs, Cli, Command, PASSWORD_ENV, RunArgs, TerminalPrompter, TestArgs, completion_line,
    plan_lines, resolve_connection,
};
use colprobe_core::logging::init_logging;
use colprobe_core::worklist::load_work_list;
use colprobe_core::{ProbeMode, TracingReporter, engine};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.global.logging_config())?;

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Test(args) => test(args).await,
        Command::Check(args) => check(&args),
    };

    if let Err(e) = &result {
        error!("{e:#}");
    }
    result
}

fn password_from_env() -> Option<String> {
    std::env::var(PASSWORD_ENV).ok()
}

/// Probes every table in the work list
async fn run(args: RunArgs) -> Result<()> {
    let outcome = colprobe::run(
        &args,
        password_from_env(),
        &mut TerminalPrompter,
        engine::connect,
        Arc::new(TracingReporter),
    )
    .await?;

    let mode = if args.dry_run {
        ProbeMode::DryRun
    } else {
        ProbeMode::Live
    };
    println!("{}", completion_line(&outcome, mode));
    Ok(())
}

/// Tests engine connectivity without probing
async fn test(args: TestArgs) -> Result<()> {
    let (config, credentials) =
        resolve_connection(&args.connection, password_from_env(), &mut TerminalPrompter)?;

    info!("Testing connection to {}...", config);
    let pool = engine::connect(&config, credentials)?;
    engine::test_connection(pool.as_ref()).await?;

    info!("✓ {} connection test successful", pool.engine());
    println!("Connection to {} successful", pool.describe());
    pool.close().await;
    Ok(())
}

/// Validates the work list and prints the worker plan
fn check(args: &CheckArgs) -> Result<()> {
    let items = load_work_list(&args.work_list)
        .with_context(|| format!("Cannot use work list {}", args.work_list.display()))?;

    println!(
        "{}: {} table(s)",
        args.work_list.display(),
        items.len()
    );
    for line in plan_lines(&items, args.workers, args.pool_size) {
        println!("  {line}");
    }
    Ok(())
}
