//! # Rollback CLI
//!
//! Restores a backup and restarts the service at an earlier version.
//!
//! Exit codes: 0 success, 1 aborted (nothing destructive happened, or the
//! configuration was unusable), 2 degraded (data changed, service not
//! confirmed healthy; needs a human now).

use anyhow::Context;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

use rollback_core::constants::exit_codes;
use rollback_core::integrations::{NonInteractivePrompter, TerminalPrompter};
use rollback_core::logging::{init_logging, LogFormat};
use rollback_core::{Prompter, RollbackConfig, RollbackOrchestrator, RollbackRequest};

#[derive(Parser, Debug)]
#[command(name = "rollback")]
#[command(about = "Roll a service and its database back to an earlier backup")]
struct Cli {
    /// Backup to restore; when omitted you are asked to choose
    #[arg(value_name = "BACKUP_PATH")]
    backup: Option<PathBuf>,

    /// Service version to start after the restore (default: the current version)
    #[arg(long = "version", value_name = "TAG")]
    target_version: Option<String>,

    /// Configuration file (default: ./rollback.toml or ./config/rollback.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Answer yes to confirmations without asking for a version; never picks among several backups
    #[arg(short, long)]
    yes: bool,

    /// List available backups and exit
    #[arg(long)]
    list: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("rollback: {e:#}");
            exit_code(exit_codes::ABORTED)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config =
        RollbackConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(
        backup_directory = %config.backup_directory.display(),
        service = %config.service.service_name,
        "Rollback CLI starting"
    );
    let orchestrator = RollbackOrchestrator::from_config(config)?;

    if cli.list {
        let backups = orchestrator.list_backups()?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&backups)?);
        } else if backups.is_empty() {
            println!("No backups found");
        } else {
            for (index, backup) in backups.iter().enumerate() {
                println!("{:>3}. {}", index + 1, backup.describe());
            }
        }
        return Ok(exit_codes::SUCCESS);
    }

    // Ctrl-C cancels only while nothing destructive has started
    let cancelled = orchestrator.cancellation_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling if the restore has not started");
            cancelled.store(true, Ordering::SeqCst);
        }
    });

    let interactive = std::io::stdin().is_terminal() && std::io::stderr().is_terminal();
    let prompter: Box<dyn Prompter> = if interactive {
        Box::new(TerminalPrompter::new(cli.yes))
    } else {
        Box::new(NonInteractivePrompter::new(cli.yes))
    };

    let request = RollbackRequest::new(cli.backup, cli.target_version);
    let outcome = orchestrator.run(request, prompter.as_ref()).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", outcome.summary());
    }

    Ok(outcome.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
