//! # Orchestration Seams
//!
//! Traits for everything the orchestrator touches outside its own process.
//! Production adapters live in [`crate::integrations`]; tests substitute
//! scripted implementations.

use async_trait::async_trait;
use std::path::Path;

use crate::error::ToolFailure;
use crate::execution::CommandOutput;
use crate::models::BackupRecord;

/// Dump/restore facility of the live data store
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Short description for logs, e.g. `postgres://db@host:5432`
    fn describe(&self) -> String;

    /// Write a full dump of the live store to `destination`
    async fn dump(&self, destination: &Path) -> Result<CommandOutput, ToolFailure>;

    /// Replace the live store's contents with the dump at `source`
    async fn restore(&self, source: &Path) -> Result<CommandOutput, ToolFailure>;
}

/// Control over the running service and its deployed version
#[async_trait]
pub trait ServiceControl: Send + Sync {
    fn service_name(&self) -> &str;

    /// Version tag that is currently deployed
    fn current_version(&self) -> String;

    /// Stop the service; succeeds only once it is confirmed stopped
    async fn stop(&self) -> Result<CommandOutput, ToolFailure>;

    /// Pull and start the service at `version`
    async fn start_at_version(&self, version: &str) -> Result<CommandOutput, ToolFailure>;

    /// Start the stopped service again exactly as it was deployed
    ///
    /// Must not pull images or change the deployed version.
    async fn resume(&self) -> Result<CommandOutput, ToolFailure>;
}

/// Failure of a single health probe
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProbeError(pub String);

/// One health check against the restored service
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// What is being probed, for logs
    fn target(&self) -> String;

    async fn probe(&self) -> Result<(), ProbeError>;
}

/// Operator interaction used when required information is missing
///
/// Implementations return `None`/`false` when no answer can be obtained;
/// the orchestrator never guesses on the operator's behalf.
pub trait Prompter: Send + Sync {
    /// Choose one of `candidates` (newest first; index 0 is the suggestion)
    fn select_backup(&self, candidates: &[BackupRecord]) -> Option<usize>;

    /// Ask a yes/no question
    fn confirm(&self, message: &str) -> bool;

    /// Ask for the version to start; `None` keeps `default`
    fn target_version(&self, default: &str) -> Option<String>;
}
