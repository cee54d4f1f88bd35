use serde::{Deserialize, Serialize};

/// Events that move a rollback run between stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RollbackEvent {
    /// Start the run
    Begin,
    /// A backup has been chosen and validated
    BackupLocated,
    /// The service reached a stopped state
    ServiceStopped,
    /// The pre-rollback snapshot was written
    SnapshotTaken,
    /// The chosen backup was applied to the live store
    RestoreApplied,
    /// The service was started at the target version
    ServiceStarted,
    /// Health verification passed
    HealthConfirmed,
    /// The current stage failed with an error message
    Fail(String),
    /// Operator cancelled the run
    Cancel,
}

impl RollbackEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::BackupLocated => "backup_located",
            Self::ServiceStopped => "service_stopped",
            Self::SnapshotTaken => "snapshot_taken",
            Self::RestoreApplied => "restore_applied",
            Self::ServiceStarted => "service_started",
            Self::HealthConfirmed => "health_confirmed",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
