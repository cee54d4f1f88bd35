use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// The unit of work for one orchestration run; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// Correlates every log line and event of the run
    pub run_id: Uuid,
    /// Backup to restore; chosen interactively when absent
    pub backup_path: Option<PathBuf>,
    /// Service version to start after the restore; defaults to the current one
    pub target_version: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl RollbackRequest {
    pub fn new(backup_path: Option<PathBuf>, target_version: Option<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            backup_path,
            target_version,
            requested_at: Utc::now(),
        }
    }

    pub fn with_backup(mut self, path: impl Into<PathBuf>) -> Self {
        self.backup_path = Some(path.into());
        self
    }

    pub fn with_target_version(mut self, version: impl Into<String>) -> Self {
        self.target_version = Some(version.into());
        self
    }
}

impl Default for RollbackRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}
