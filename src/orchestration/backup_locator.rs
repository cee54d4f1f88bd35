//! # Backup Locator
//!
//! Finds and validates the restore point for a run. Strictly read-only.
//!
//! Candidates are ordered newest first by creation time, ties broken by file
//! name (descending) so the order never depends on directory iteration. The
//! newest candidate is only ever a *suggestion*: without an explicit path the
//! operator has to pick or confirm through the [`Prompter`].

use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::RollbackConfig;
use crate::error::{Result, RollbackError};
use crate::models::BackupRecord;
use crate::orchestration::types::Prompter;

#[derive(Debug, Clone)]
pub struct BackupLocator {
    backup_directory: PathBuf,
    extensions: Vec<String>,
}

impl BackupLocator {
    pub fn new(backup_directory: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            backup_directory: backup_directory.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &RollbackConfig) -> Self {
        Self::new(
            config.backup_directory.clone(),
            config.backup_extensions.clone(),
        )
    }

    pub fn backup_directory(&self) -> &Path {
        &self.backup_directory
    }

    /// Resolve the backup for a run
    ///
    /// With an explicit path the file is validated and returned. Without one,
    /// the operator must choose among the candidates (or confirm the only one).
    pub fn locate(
        &self,
        explicit: Option<&Path>,
        prompter: &dyn Prompter,
    ) -> Result<BackupRecord> {
        if let Some(path) = explicit {
            let record = self.inspect(&self.resolve_explicit(path))?;
            info!(backup = %record.location.display(), "Using explicitly requested backup");
            return Ok(record);
        }

        let mut candidates = self.list_candidates()?;
        debug!(
            directory = %self.backup_directory.display(),
            candidates = candidates.len(),
            "Listed backup candidates"
        );

        match candidates.len() {
            0 => Err(RollbackError::NotFound {
                path: self.backup_directory.clone(),
            }),
            1 => {
                let only = candidates.remove(0);
                if prompter.confirm(&format!("Restore backup {}?", only.describe())) {
                    Ok(only)
                } else {
                    Err(RollbackError::cancelled(format!(
                        "operator did not confirm {}",
                        only.file_name()
                    )))
                }
            }
            len => match prompter.select_backup(&candidates) {
                Some(index) if index < len => Ok(candidates.swap_remove(index)),
                _ => Err(RollbackError::AmbiguousSelection {
                    directory: self.backup_directory.clone(),
                    candidates: candidates.into_iter().map(|c| c.location).collect(),
                }),
            },
        }
    }

    /// All backups in the backup directory, newest first
    ///
    /// A missing directory yields no candidates.
    pub fn list_candidates(&self) -> Result<Vec<BackupRecord>> {
        let entries = match fs::read_dir(&self.backup_directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(RollbackError::io(
                    format!("reading backup directory {}", self.backup_directory.display()),
                    e,
                ))
            }
        };

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                RollbackError::io(
                    format!("reading backup directory {}", self.backup_directory.display()),
                    e,
                )
            })?;
            let path = entry.path();
            if !self.has_backup_extension(&path) {
                continue;
            }
            match self.inspect(&path) {
                Ok(record) => candidates.push(record),
                // Empty or non-file entries are not candidates
                Err(RollbackError::InvalidBackup { path, reason }) => {
                    debug!(path = %path.display(), reason = %reason, "Skipping backup candidate");
                }
                Err(e) => return Err(e),
            }
        }

        sort_newest_first(&mut candidates);
        Ok(candidates)
    }

    /// Build a validated record for one file without modifying it
    pub fn inspect(&self, path: &Path) -> Result<BackupRecord> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(RollbackError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(RollbackError::io(format!("inspecting {}", path.display()), e)),
        };

        if !metadata.is_file() {
            return Err(RollbackError::InvalidBackup {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }
        if metadata.len() == 0 {
            return Err(RollbackError::InvalidBackup {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }

        let location = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let parsed = BackupRecord::parse_name(&location);
        let created_at = parsed
            .created_at
            .or_else(|| metadata.modified().ok().map(DateTime::<Utc>::from))
            .unwrap_or_default();

        Ok(BackupRecord {
            location,
            created_at,
            size_bytes: metadata.len(),
            source_version: parsed.source_version,
        })
    }

    /// Relative paths that do not exist from the working directory are looked
    /// up inside the backup directory.
    fn resolve_explicit(&self, path: &Path) -> PathBuf {
        if path.is_relative() && !path.exists() {
            let in_backup_dir = self.backup_directory.join(path);
            if in_backup_dir.exists() {
                return in_backup_dir;
            }
        }
        path.to_path_buf()
    }

    fn has_backup_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }
}

fn sort_newest_first(candidates: &mut [BackupRecord]) {
    candidates.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.file_name().cmp(&a.file_name()))
    });
}
