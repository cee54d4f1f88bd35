//! Applies the chosen backup to the live data store.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Result, RollbackError};
use crate::execution::CommandOutput;
use crate::models::BackupRecord;
use crate::orchestration::types::DataStore;

pub struct RestoreExecutor {
    data_store: Arc<dyn DataStore>,
}

impl RestoreExecutor {
    pub fn new(data_store: Arc<dyn DataStore>) -> Self {
        Self { data_store }
    }

    /// Restore `target`. The safety snapshot path is carried into the error so
    /// the operator always knows where the previous data went.
    pub async fn apply(&self, target: &BackupRecord, safety_snapshot: &Path) -> Result<CommandOutput> {
        info!(
            backup = %target.location.display(),
            data_store = %self.data_store.describe(),
            "Restoring backup"
        );

        match self.data_store.restore(&target.location).await {
            Ok(output) => {
                info!(duration_ms = output.duration_ms, "Backup restored");
                Ok(output)
            }
            Err(failure) => {
                error!(
                    backup = %target.location.display(),
                    safety_snapshot = %safety_snapshot.display(),
                    error = %failure,
                    "Restore failed"
                );
                Err(RollbackError::RestoreFailed {
                    backup: target.location.clone(),
                    safety_snapshot: safety_snapshot.to_path_buf(),
                    failure,
                })
            }
        }
    }
}
