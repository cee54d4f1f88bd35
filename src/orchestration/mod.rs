//! # Orchestration
//!
//! The five rollback stages and the orchestrator that sequences them.
//!
//! ## Core Components
//!
//! - **BackupLocator**: finds and validates the restore point (read-only)
//! - **SnapshotManager**: writes the pre-rollback safety snapshot
//! - **RestoreExecutor**: applies the chosen backup to the live data store
//! - **ServiceController**: stops the service and starts it at the target version
//! - **HealthVerifier**: bounded, consecutive-success health polling
//! - **RollbackOrchestrator**: runs the stages through the state machine and
//!   produces the [`RollbackOutcome`](crate::models::RollbackOutcome)
//!
//! External systems are reached only through the traits in [`types`].

pub mod backup_locator;
pub mod health_verifier;
pub mod restore_executor;
pub mod rollback_orchestrator;
pub mod service_controller;
pub mod snapshot_manager;
pub mod types;

pub use backup_locator::BackupLocator;
pub use health_verifier::HealthVerifier;
pub use restore_executor::RestoreExecutor;
pub use rollback_orchestrator::RollbackOrchestrator;
pub use service_controller::ServiceController;
pub use snapshot_manager::SnapshotManager;
pub use types::{DataStore, HealthProbe, ProbeError, Prompter, ServiceControl};
