#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, pg_dump in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Rollback Core
//!
//! Safe, auditable rollback of a Postgres-backed service deployed with Docker
//! Compose.
//!
//! ## Overview
//!
//! A rollback restores the data store from an earlier backup and restarts the
//! service at an earlier version. Both steps are destructive, so every run
//! follows the same guarded sequence:
//!
//! 1. **Locate** the backup to restore (explicit path or operator choice)
//! 2. **Stop** the service
//! 3. **Snapshot** the live data store (the pre-rollback safety snapshot)
//! 4. **Restore** the chosen backup
//! 5. **Start** the service at the target version
//! 6. **Verify** health with a bounded, consecutive-success polling loop
//!
//! The run ends `Success`, `Aborted` (nothing destructive happened) or
//! `Degraded` (data changed, the service is not confirmed healthy). A
//! `Degraded` run is never rolled back automatically; its outcome names the
//! pre-rollback snapshot so an operator can decide what to do.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - The five stages and the orchestrator
//! - [`state_machine`] - Stage machine with guarded transitions
//! - [`integrations`] - `pg_dump`/`psql`, Docker Compose, health probes, prompts
//! - [`execution`] - External process execution
//! - [`models`] - Backup records, requests and outcomes
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`events`] - Lifecycle event publishing
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollback_core::config::RollbackConfig;
//! use rollback_core::integrations::NonInteractivePrompter;
//! use rollback_core::models::RollbackRequest;
//! use rollback_core::orchestration::RollbackOrchestrator;
//!
//! # async fn example() -> rollback_core::Result<()> {
//! let config = RollbackConfig::load(None)?;
//! let orchestrator = RollbackOrchestrator::from_config(config)?;
//!
//! let request = RollbackRequest::default()
//!     .with_backup("backups/2024-01-01.sql")
//!     .with_target_version("v1.4.0");
//! let outcome = orchestrator
//!     .run(request, &NonInteractivePrompter::new(true))
//!     .await;
//!
//! println!("{}", outcome.summary());
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod execution;
pub mod integrations;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;

pub use config::RollbackConfig;
pub use constants::exit_codes;
pub use error::{ErrorKind, ErrorPhase, Result, RollbackError, ToolFailure};
pub use events::EventPublisher;
pub use models::{BackupRecord, RollbackOutcome, RollbackRequest};
pub use orchestration::{
    DataStore, HealthProbe, ProbeError, Prompter, RollbackOrchestrator, ServiceControl,
};
pub use state_machine::RollbackStage;
