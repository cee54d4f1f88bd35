//! # Snapshot Manager
//!
//! Takes the pre-rollback safety snapshot. Nothing destructive may happen in a
//! run until this has succeeded.
//!
//! Snapshot names embed the current UTC time to the second
//! (`pre_rollback_20240101_120000__v1.4.0.sql`); if that name is already taken
//! a `-1`, `-2`, … suffix is added, so two snapshots never share a file.

use chrono::{DateTime, Timelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::RollbackConfig;
use crate::constants::defaults::SNAPSHOT_EXTENSION;
use crate::error::{Result, RollbackError, ToolFailure};
use crate::models::BackupRecord;
use crate::orchestration::types::DataStore;

pub struct SnapshotManager {
    backup_directory: PathBuf,
    prefix: String,
    data_store: Arc<dyn DataStore>,
}

impl SnapshotManager {
    pub fn new(
        backup_directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        data_store: Arc<dyn DataStore>,
    ) -> Self {
        Self {
            backup_directory: backup_directory.into(),
            prefix: prefix.into(),
            data_store,
        }
    }

    pub fn from_config(config: &RollbackConfig, data_store: Arc<dyn DataStore>) -> Self {
        Self::new(
            config.backup_directory.clone(),
            config.snapshot_prefix.clone(),
            data_store,
        )
    }

    /// Path a snapshot taken at `taken_at` would be written to
    pub fn snapshot_path(&self, taken_at: DateTime<Utc>, source_version: Option<&str>) -> PathBuf {
        let name =
            BackupRecord::compose_name(&self.prefix, taken_at, source_version, SNAPSHOT_EXTENSION);
        let first = self.backup_directory.join(&name);
        if !first.exists() {
            return first;
        }

        let stem = name
            .strip_suffix(&format!(".{SNAPSHOT_EXTENSION}"))
            .unwrap_or(&name)
            .to_string();
        (1u32..)
            .map(|n| {
                self.backup_directory
                    .join(format!("{stem}-{n}.{SNAPSHOT_EXTENSION}"))
            })
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }

    /// Dump the live store into a new, uniquely named backup
    pub async fn take_snapshot(&self, source_version: Option<&str>) -> Result<BackupRecord> {
        let taken_at = Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now);

        if let Err(e) = tokio::fs::create_dir_all(&self.backup_directory).await {
            return Err(RollbackError::SnapshotFailed {
                destination: self.backup_directory.clone(),
                failure: ToolFailure::Unavailable(format!(
                    "cannot create backup directory {}: {e}",
                    self.backup_directory.display()
                )),
            });
        }

        let destination = self.snapshot_path(taken_at, source_version);
        info!(
            destination = %destination.display(),
            data_store = %self.data_store.describe(),
            "Taking pre-rollback snapshot"
        );

        if let Err(failure) = self.data_store.dump(&destination).await {
            discard_partial(&destination).await;
            return Err(RollbackError::SnapshotFailed {
                destination,
                failure,
            });
        }

        let size_bytes = match tokio::fs::metadata(&destination).await {
            Ok(metadata) if metadata.len() > 0 => metadata.len(),
            _ => {
                discard_partial(&destination).await;
                return Err(RollbackError::SnapshotFailed {
                    destination,
                    failure: ToolFailure::Unconfirmed(
                        "dump reported success but wrote no data".to_string(),
                    ),
                });
            }
        };

        let location = tokio::fs::canonicalize(&destination)
            .await
            .unwrap_or(destination);
        info!(snapshot = %location.display(), size_bytes, "Pre-rollback snapshot written");

        Ok(BackupRecord {
            location,
            created_at: taken_at,
            size_bytes,
            source_version: source_version.map(str::to_string),
        })
    }
}

/// A half-written dump must not be mistaken for a backup later
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!(path = %path.display(), "Removed partial snapshot"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove partial snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CommandOutput;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct FakeStore {
        contents: &'static str,
        exit_code: i32,
    }

    #[async_trait]
    impl DataStore for FakeStore {
        fn describe(&self) -> String {
            "fake".to_string()
        }

        async fn dump(&self, destination: &Path) -> std::result::Result<CommandOutput, ToolFailure> {
            tokio::fs::write(destination, self.contents).await.unwrap();
            let output = CommandOutput {
                command: format!("pg_dump -f {}", destination.display()),
                exit_code: Some(self.exit_code),
                stdout: String::new(),
                stderr: if self.exit_code == 0 { String::new() } else { "connection refused".to_string() },
                duration_ms: 1,
                started_at: Utc::now(),
            };
            if output.success() {
                Ok(output)
            } else {
                Err(ToolFailure::Exited(output))
            }
        }

        async fn restore(&self, _source: &Path) -> std::result::Result<CommandOutput, ToolFailure> {
            unreachable!("snapshot manager never restores")
        }
    }

    fn manager(dir: &TempDir, store: FakeStore) -> SnapshotManager {
        SnapshotManager::new(dir.path(), "pre_rollback", Arc::new(store))
    }

    #[test]
    fn test_snapshot_path_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FakeStore { contents: "x", exit_code: 0 });
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = mgr.snapshot_path(at, Some("v1"));
        assert_eq!(first, dir.path().join("pre_rollback_20240101_000000__v1.sql"));

        std::fs::write(&first, "taken").unwrap();
        let second = mgr.snapshot_path(at, Some("v1"));
        assert_eq!(second, dir.path().join("pre_rollback_20240101_000000__v1-1.sql"));

        std::fs::write(&second, "taken").unwrap();
        let third = mgr.snapshot_path(at, Some("v1"));
        assert_eq!(third, dir.path().join("pre_rollback_20240101_000000__v1-2.sql"));
    }

    #[tokio::test]
    async fn test_successful_snapshot_record() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FakeStore { contents: "CREATE TABLE feeds();", exit_code: 0 });

        let record = mgr.take_snapshot(Some("v2.0.0")).await.unwrap();

        assert!(record.location.exists());
        assert_eq!(record.size_bytes, 21);
        assert_eq!(record.source_version.as_deref(), Some("v2.0.0"));
        assert!(record.file_name().starts_with("pre_rollback_"));
        assert_eq!(record.created_at.nanosecond(), 0);
    }

    #[tokio::test]
    async fn test_failed_dump_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FakeStore { contents: "-- partial", exit_code: 1 });

        let err = mgr.take_snapshot(None).await.unwrap_err();

        match &err {
            RollbackError::SnapshotFailed { destination, failure } => {
                assert!(!destination.exists());
                assert_eq!(failure.output().and_then(|o| o.exit_code), Some(1));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_dump_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mgr = manager(&dir, FakeStore { contents: "", exit_code: 0 });

        let err = mgr.take_snapshot(None).await.unwrap_err();
        assert!(matches!(
            err,
            RollbackError::SnapshotFailed {
                failure: ToolFailure::Unconfirmed(_),
                ..
            }
        ));
    }
}
