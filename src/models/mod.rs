//! # Data Models
//!
//! Records describing backups and a single rollback run.

pub mod backup_record;
pub mod rollback_outcome;
pub mod rollback_request;

pub use backup_record::{BackupRecord, ParsedBackupName};
pub use rollback_outcome::{HealthReport, OutcomeError, RollbackOutcome};
pub use rollback_request::RollbackRequest;
