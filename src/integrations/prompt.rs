//! Operator prompts.
//!
//! [`TerminalPrompter`] asks on the attached terminal. [`NonInteractivePrompter`]
//! is used with `--yes` or when no terminal is attached: it never chooses a
//! backup on the operator's behalf and only confirms when told to.

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use tracing::warn;

use crate::models::BackupRecord;
use crate::orchestration::types::Prompter;

pub struct TerminalPrompter {
    theme: ColorfulTheme,
    /// Answer yes/no questions with "yes" without asking
    assume_yes: bool,
}

impl TerminalPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            assume_yes,
        }
    }
}

impl Prompter for TerminalPrompter {
    fn select_backup(&self, candidates: &[BackupRecord]) -> Option<usize> {
        let items: Vec<String> = candidates.iter().map(BackupRecord::describe).collect();
        Select::with_theme(&self.theme)
            .with_prompt("Select the backup to restore (newest first, Esc to abort)")
            .items(&items)
            .default(0)
            .interact_opt()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Backup selection prompt failed");
                None
            })
    }

    fn confirm(&self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact_opt()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Confirmation prompt failed");
                None
            })
            .unwrap_or(false)
    }

    fn target_version(&self, default: &str) -> Option<String> {
        if self.assume_yes {
            return None;
        }
        Input::<String>::with_theme(&self.theme)
            .with_prompt("Version to start after the restore")
            .default(default.to_string())
            .interact_text()
            .map_err(|e| warn!(error = %e, "Version prompt failed"))
            .ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompter {
    assume_yes: bool,
}

impl NonInteractivePrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Prompter for NonInteractivePrompter {
    fn select_backup(&self, _candidates: &[BackupRecord]) -> Option<usize> {
        None
    }

    fn confirm(&self, _message: &str) -> bool {
        self.assume_yes
    }

    fn target_version(&self, _default: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    #[test]
    fn test_non_interactive_never_selects() {
        let record = BackupRecord {
            location: PathBuf::from("/backups/a.sql"),
            created_at: Utc::now(),
            size_bytes: 1,
            source_version: None,
        };
        let prompter = NonInteractivePrompter::new(true);

        assert_eq!(prompter.select_backup(&[record.clone(), record]), None);
        assert!(prompter.confirm("Restore?"));
        assert_eq!(prompter.target_version("v2.0.0"), None);
        assert!(!NonInteractivePrompter::default().confirm("Restore?"));
    }

    #[test]
    fn test_terminal_assume_yes_keeps_default_version() {
        let prompter = TerminalPrompter::new(true);

        assert!(prompter.confirm("Stop app, restore a.sql and start version v2.0.0?"));
        assert_eq!(prompter.target_version("v2.0.0"), None);
    }
}
