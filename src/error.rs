//! # Rollback Error Types
//!
//! One error enum covers every way a rollback run can stop. Each variant knows
//! which [`ErrorPhase`] it belongs to: pre-flight failures happen before the
//! live data store is touched, post-side-effect failures happen after and
//! always need a human to decide what to do next.

use crate::execution::{CommandError, CommandOutput};
use crate::state_machine::{RollbackStage, StateMachineError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why an external tool invocation did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum ToolFailure {
    /// The tool ran and exited non-zero
    Exited(CommandOutput),
    /// The tool could not be run (missing binary, timeout)
    Unavailable(String),
    /// The tool exited 0 but the expected state was not observed afterwards
    Unconfirmed(String),
}

impl ToolFailure {
    /// Captured output, when the tool actually ran
    pub fn output(&self) -> Option<&CommandOutput> {
        match self {
            Self::Exited(output) => Some(output),
            Self::Unavailable(_) | Self::Unconfirmed(_) => None,
        }
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(output) => {
                let diagnostics = output.diagnostics();
                if diagnostics.is_empty() {
                    write!(f, "`{}` failed with {}", output.command, output.exit_status())
                } else {
                    write!(
                        f,
                        "`{}` failed with {}: {}",
                        output.command,
                        output.exit_status(),
                        diagnostics
                    )
                }
            }
            Self::Unavailable(message) | Self::Unconfirmed(message) => write!(f, "{message}"),
        }
    }
}

impl From<CommandError> for ToolFailure {
    fn from(err: CommandError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// When in the run an error happened, relative to the first destructive action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    /// Before any rollback run was attempted (configuration)
    PreRun,
    /// No data touched yet
    PreFlight,
    /// The live data store may have changed
    PostSideEffect,
}

/// Stable, serializable name for each error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AmbiguousSelection,
    InvalidBackup,
    Cancelled,
    SnapshotFailed,
    StopFailed,
    RestoreFailed,
    StartFailed,
    HealthCheckFailed,
    Configuration,
    Io,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::AmbiguousSelection => "AmbiguousSelection",
            Self::InvalidBackup => "InvalidBackup",
            Self::Cancelled => "Cancelled",
            Self::SnapshotFailed => "SnapshotFailed",
            Self::StopFailed => "StopFailed",
            Self::RestoreFailed => "RestoreFailed",
            Self::StartFailed => "StartFailed",
            Self::HealthCheckFailed => "HealthCheckFailed",
            Self::Configuration => "Configuration",
            Self::Io => "Io",
            Self::Internal => "Internal",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("Backup not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error(
        "Ambiguous backup selection: {} candidates in {} and none was chosen",
        candidates.len(),
        directory.display()
    )]
    AmbiguousSelection {
        directory: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Invalid backup {}: {reason}", path.display())]
    InvalidBackup { path: PathBuf, reason: String },

    #[error("Rollback cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Pre-rollback snapshot to {} failed: {failure}", destination.display())]
    SnapshotFailed {
        destination: PathBuf,
        failure: ToolFailure,
    },

    #[error("Failed to stop service {service}: {failure}")]
    StopFailed {
        service: String,
        failure: ToolFailure,
    },

    #[error(
        "Restore of {} failed: {failure}; pre-rollback snapshot kept at {}",
        backup.display(),
        safety_snapshot.display()
    )]
    RestoreFailed {
        backup: PathBuf,
        safety_snapshot: PathBuf,
        failure: ToolFailure,
    },

    #[error(
        "Data restored, service not started: {service} at version {version}: {failure}; pre-rollback snapshot kept at {}",
        safety_snapshot.display()
    )]
    StartFailed {
        service: String,
        version: String,
        safety_snapshot: PathBuf,
        failure: ToolFailure,
    },

    #[error(
        "Health check failed after {attempts} attempts ({required_consecutive} consecutive successes required): {last_error}"
    )]
    HealthCheckFailed {
        attempts: u32,
        required_consecutive: u32,
        last_error: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error in {stage}: {message}")]
    Internal {
        stage: RollbackStage,
        message: String,
    },
}

impl RollbackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AmbiguousSelection { .. } => ErrorKind::AmbiguousSelection,
            Self::InvalidBackup { .. } => ErrorKind::InvalidBackup,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::SnapshotFailed { .. } => ErrorKind::SnapshotFailed,
            Self::StopFailed { .. } => ErrorKind::StopFailed,
            Self::RestoreFailed { .. } => ErrorKind::RestoreFailed,
            Self::StartFailed { .. } => ErrorKind::StartFailed,
            Self::HealthCheckFailed { .. } => ErrorKind::HealthCheckFailed,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn phase(&self) -> ErrorPhase {
        match self {
            Self::Configuration(_) => ErrorPhase::PreRun,
            Self::Io { .. }
            | Self::NotFound { .. }
            | Self::AmbiguousSelection { .. }
            | Self::InvalidBackup { .. }
            | Self::Cancelled { .. }
            | Self::SnapshotFailed { .. }
            | Self::StopFailed { .. } => ErrorPhase::PreFlight,
            Self::RestoreFailed { .. }
            | Self::StartFailed { .. }
            | Self::HealthCheckFailed { .. } => ErrorPhase::PostSideEffect,
            Self::Internal { stage, .. } => {
                if stage.is_pre_destructive() || *stage == RollbackStage::Aborted {
                    ErrorPhase::PreFlight
                } else {
                    ErrorPhase::PostSideEffect
                }
            }
        }
    }

    /// Whether the live data store may have been changed when this error occurred
    pub fn is_post_side_effect(&self) -> bool {
        self.phase() == ErrorPhase::PostSideEffect
    }

    /// Captured output of the failing tool, if there was one
    pub fn tool_output(&self) -> Option<&CommandOutput> {
        match self {
            Self::SnapshotFailed { failure, .. }
            | Self::StopFailed { failure, .. }
            | Self::RestoreFailed { failure, .. }
            | Self::StartFailed { failure, .. } => failure.output(),
            _ => None,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }
}

impl From<StateMachineError> for RollbackError {
    fn from(err: StateMachineError) -> Self {
        Self::Internal {
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for RollbackError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RollbackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn failed_output(stderr: &str) -> CommandOutput {
        CommandOutput {
            command: "docker compose up -d app".to_string(),
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration_ms: 12,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_phase_classification() {
        assert_eq!(
            RollbackError::NotFound {
                path: PathBuf::from("missing.sql")
            }
            .phase(),
            ErrorPhase::PreFlight
        );
        assert_eq!(
            RollbackError::SnapshotFailed {
                destination: PathBuf::from("pre.sql"),
                failure: ToolFailure::Unavailable("pg_dump missing".to_string()),
            }
            .phase(),
            ErrorPhase::PreFlight
        );
        assert!(RollbackError::HealthCheckFailed {
            attempts: 3,
            required_consecutive: 1,
            last_error: "503".to_string(),
        }
        .is_post_side_effect());
        assert_eq!(
            RollbackError::Configuration("bad".to_string()).phase(),
            ErrorPhase::PreRun
        );
    }

    #[test]
    fn test_internal_phase_follows_stage() {
        let blocked = RollbackError::from(StateMachineError::GuardFailed {
            from: RollbackStage::Snapshotting,
            reason: "no snapshot recorded".to_string(),
        });
        assert_eq!(blocked.kind(), ErrorKind::Internal);
        assert_eq!(blocked.phase(), ErrorPhase::PreFlight);

        let late = RollbackError::from(StateMachineError::InvalidTransition {
            from: RollbackStage::RestartingService,
            event: "begin".to_string(),
        });
        assert!(late.is_post_side_effect());
    }

    #[test]
    fn test_start_failed_message_flags_partial_state() {
        let err = RollbackError::StartFailed {
            service: "app".to_string(),
            version: "v1.4.0".to_string(),
            safety_snapshot: PathBuf::from("/backups/pre_rollback_20240101_000000.sql"),
            failure: ToolFailure::Exited(failed_output("image not found")),
        };

        let message = err.to_string();
        assert!(message.starts_with("Data restored, service not started"));
        assert!(message.contains("/backups/pre_rollback_20240101_000000.sql"));
        assert!(message.contains("image not found"));
        assert_eq!(err.kind(), ErrorKind::StartFailed);
        assert_eq!(err.tool_output().and_then(|o| o.exit_code), Some(1));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AmbiguousSelection).unwrap();
        assert_eq!(json, "\"ambiguous_selection\"");
        assert_eq!(ErrorKind::AmbiguousSelection.to_string(), "AmbiguousSelection");
    }
}
