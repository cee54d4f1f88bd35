//! # Backup Record
//!
//! A named, timestamped snapshot of the data store's complete contents.
//! Records are immutable: the locator builds them from files on disk and the
//! snapshot manager builds one for every pre-rollback snapshot it writes.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::defaults::{SNAPSHOT_TIMESTAMP_FORMAT, VERSION_SEPARATOR};

/// Length of a `%Y%m%d_%H%M%S` timestamp
const TIMESTAMP_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Where the backup lives on disk
    pub location: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// Service version the backup was taken from, when known
    pub source_version: Option<String>,
}

/// Metadata recovered from a backup file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBackupName {
    pub created_at: Option<DateTime<Utc>>,
    pub source_version: Option<String>,
}

impl BackupRecord {
    pub fn file_name(&self) -> String {
        self.location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.location.display().to_string())
    }

    /// One-line description used in listings and prompts
    pub fn describe(&self) -> String {
        let version = self
            .source_version
            .as_deref()
            .map(|v| format!(", version {v}"))
            .unwrap_or_default();
        format!(
            "{}  ({}, {}{})",
            self.file_name(),
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            human_size(self.size_bytes),
            version
        )
    }

    /// Build the file name for a backup: `<prefix>_<timestamp>[__<version>].<ext>`
    pub fn compose_name(
        prefix: &str,
        created_at: DateTime<Utc>,
        source_version: Option<&str>,
        extension: &str,
    ) -> String {
        let timestamp = created_at.format(SNAPSHOT_TIMESTAMP_FORMAT);
        match source_version.map(sanitize_version) {
            Some(version) if !version.is_empty() => {
                format!("{prefix}_{timestamp}{VERSION_SEPARATOR}{version}.{extension}")
            }
            _ => format!("{prefix}_{timestamp}.{extension}"),
        }
    }

    /// Recover timestamp and version from a name produced by [`Self::compose_name`]
    ///
    /// Names that do not follow the scheme yield an empty result rather than
    /// an error; a numeric collision suffix (`-1`, `-2`) is tolerated.
    pub fn parse_name(path: &Path) -> ParsedBackupName {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return ParsedBackupName::default();
        };

        let (base, version) = match stem.split_once(VERSION_SEPARATOR) {
            Some((base, version)) => (base.to_string(), Some(strip_collision_suffix(version))),
            None => (strip_collision_suffix(&stem), None),
        };

        let created_at = base
            .len()
            .checked_sub(TIMESTAMP_LEN)
            .and_then(|start| base.get(start..))
            .and_then(|ts| NaiveDateTime::parse_from_str(ts, SNAPSHOT_TIMESTAMP_FORMAT).ok())
            .map(|naive| Utc.from_utc_datetime(&naive));

        ParsedBackupName {
            created_at,
            source_version: created_at
                .and(version)
                .filter(|v: &String| !v.is_empty()),
        }
    }
}

fn strip_collision_suffix(value: &str) -> String {
    match value.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
            head.to_string()
        }
        _ => value.to_string(),
    }
}

/// Keep version tags safe to embed in a file name
fn sanitize_version(version: &str) -> String {
    version
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
