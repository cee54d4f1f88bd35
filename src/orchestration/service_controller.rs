//! # Service Controller
//!
//! Stops the service before the data store is touched and starts it again at
//! the target version afterwards. Tool failures are mapped onto the run's
//! error taxonomy here so the orchestrator only deals with [`RollbackError`].

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{Result, RollbackError};
use crate::execution::CommandOutput;
use crate::orchestration::types::ServiceControl;

pub struct ServiceController {
    service: Arc<dyn ServiceControl>,
}

impl ServiceController {
    pub fn new(service: Arc<dyn ServiceControl>) -> Self {
        Self { service }
    }

    pub fn service_name(&self) -> &str {
        self.service.service_name()
    }

    pub fn current_version(&self) -> String {
        self.service.current_version()
    }

    pub async fn stop(&self) -> Result<CommandOutput> {
        info!(service = %self.service.service_name(), "Stopping service");
        self.service
            .stop()
            .await
            .map_err(|failure| RollbackError::StopFailed {
                service: self.service.service_name().to_string(),
                failure,
            })
    }

    pub async fn start(&self, version: &str, safety_snapshot: &Path) -> Result<CommandOutput> {
        info!(service = %self.service.service_name(), version, "Starting service");
        match self.service.start_at_version(version).await {
            Ok(output) => Ok(output),
            Err(failure) => {
                error!(
                    service = %self.service.service_name(),
                    version,
                    error = %failure,
                    "Service did not start after restore"
                );
                Err(RollbackError::StartFailed {
                    service: self.service.service_name().to_string(),
                    version: version.to_string(),
                    safety_snapshot: safety_snapshot.to_path_buf(),
                    failure,
                })
            }
        }
    }

    /// Best-effort restart of the deployment that was running before the run
    ///
    /// Used when a run aborts after the service was stopped but before any
    /// data changed. Returns whether the restart succeeded.
    pub async fn resume(&self) -> bool {
        let version = self.service.current_version();
        match self.service.resume().await {
            Ok(_) => {
                info!(service = %self.service.service_name(), version = %version, "Service resumed");
                true
            }
            Err(failure) => {
                warn!(
                    service = %self.service.service_name(),
                    version = %version,
                    error = %failure,
                    "Could not resume service"
                );
                false
            }
        }
    }
}
