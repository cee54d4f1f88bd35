//! # Structured Logging Module
//!
//! Console logging for rollback runs. Everything goes to stderr so that
//! stdout carries only the run summary (or its JSON form). Set `RUST_LOG` to
//! override the level chosen from the verbosity flag.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

use crate::constants::env::ROLLBACK_ENV;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Initialize structured logging once per process
///
/// `verbosity` is the number of `-v` flags given on the command line.
pub fn init_logging(verbosity: u8, format: LogFormat) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(verbosity)));

        let layer = match format {
            LogFormat::Pretty => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed(),
        };

        // An embedding application may already own the global subscriber
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::debug!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var(ROLLBACK_ENV)
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "production".to_string())
}

/// Map the `-v` count to a filter directive
fn get_log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Log structured data for a rollback stage transition
pub fn log_stage_operation(
    run_id: Uuid,
    from_stage: &str,
    to_stage: &str,
    event: &str,
    details: Option<&str>,
) {
    tracing::info!(
        run_id = %run_id,
        from_stage = %from_stage,
        to_stage = %to_stage,
        event = %event,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "ROLLBACK_STAGE"
    );
}

/// Log structured data for an external tool invocation
pub fn log_tool_operation(
    run_id: Uuid,
    stage: &str,
    command: &str,
    status: &str,
    duration_ms: Option<u64>,
) {
    tracing::info!(
        run_id = %run_id,
        stage = %stage,
        command = %command,
        status = %status,
        duration_ms = duration_ms,
        "ROLLBACK_TOOL"
    );
}
