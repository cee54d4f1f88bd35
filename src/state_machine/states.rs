use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages of a rollback run, in execution order, followed by the three
/// terminal outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStage {
    /// Run created, nothing done yet
    Idle,
    /// Resolving and validating the backup to restore
    LocatingBackup,
    /// Stopping the running service so the data store is quiescent
    StoppingService,
    /// Taking the pre-rollback safety snapshot
    Snapshotting,
    /// Applying the chosen backup to the live data store
    Restoring,
    /// Starting the service at the target version
    RestartingService,
    /// Polling the health endpoint
    VerifyingHealth,
    /// Rollback applied and service healthy
    Success,
    /// Data changed but the run did not finish cleanly
    Degraded,
    /// Stopped before the live data store was touched
    Aborted,
}

impl RollbackStage {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Degraded | Self::Aborted)
    }

    /// Stages that run before any destructive action on the data store
    pub fn is_pre_destructive(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::LocatingBackup | Self::StoppingService | Self::Snapshotting
        )
    }

    /// Stages entered after the restore began; failures here leave data changed
    pub fn has_touched_data(&self) -> bool {
        matches!(
            self,
            Self::Restoring | Self::RestartingService | Self::VerifyingHealth
        )
    }

    /// The operator may only cancel before the restore starts
    pub fn allows_cancel(&self) -> bool {
        self.is_pre_destructive()
    }

    /// Process exit code for a terminal stage
    pub fn exit_code(&self) -> Option<i32> {
        use crate::constants::exit_codes;
        match self {
            Self::Success => Some(exit_codes::SUCCESS),
            Self::Aborted => Some(exit_codes::ABORTED),
            Self::Degraded => Some(exit_codes::DEGRADED),
            _ => None,
        }
    }
}

impl fmt::Display for RollbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LocatingBackup => write!(f, "locating_backup"),
            Self::StoppingService => write!(f, "stopping_service"),
            Self::Snapshotting => write!(f, "snapshotting"),
            Self::Restoring => write!(f, "restoring"),
            Self::RestartingService => write!(f, "restarting_service"),
            Self::VerifyingHealth => write!(f, "verifying_health"),
            Self::Success => write!(f, "success"),
            Self::Degraded => write!(f, "degraded"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for RollbackStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "locating_backup" => Ok(Self::LocatingBackup),
            "stopping_service" => Ok(Self::StoppingService),
            "snapshotting" => Ok(Self::Snapshotting),
            "restoring" => Ok(Self::Restoring),
            "restarting_service" => Ok(Self::RestartingService),
            "verifying_health" => Ok(Self::VerifyingHealth),
            "success" => Ok(Self::Success),
            "degraded" => Ok(Self::Degraded),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid rollback stage: {s}")),
        }
    }
}

impl Default for RollbackStage {
    fn default() -> Self {
        Self::Idle
    }
}
