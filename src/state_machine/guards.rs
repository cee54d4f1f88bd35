use super::errors::{precondition_not_met, GuardResult};

/// Facts about the run that guards inspect before allowing a transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFacts {
    /// A backup has been chosen and validated
    pub backup_selected: bool,
    /// The pre-rollback safety snapshot exists on disk
    pub snapshot_recorded: bool,
}

/// Trait for implementing state transition guards
pub trait StateGuard {
    /// Check if a transition is allowed
    fn check(&self, facts: &RunFacts) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard that keeps the service running until there is something to restore
pub struct BackupSelectedGuard;

impl StateGuard for BackupSelectedGuard {
    fn check(&self, facts: &RunFacts) -> GuardResult<()> {
        if !facts.backup_selected {
            return Err(precondition_not_met(
                "a backup must be selected before the service is stopped",
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Backup must be selected"
    }
}

/// Guard that refuses to enter the restore without a safety snapshot
pub struct SnapshotRecordedGuard;

impl StateGuard for SnapshotRecordedGuard {
    fn check(&self, facts: &RunFacts) -> GuardResult<()> {
        if !facts.snapshot_recorded {
            return Err(precondition_not_met(
                "a pre-rollback snapshot must exist before restoring",
            ));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Pre-rollback snapshot must be recorded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_guard() {
        let guard = SnapshotRecordedGuard;
        assert!(guard.check(&RunFacts::default()).is_err());
        assert!(guard
            .check(&RunFacts {
                backup_selected: true,
                snapshot_recorded: true,
            })
            .is_ok());
    }

    #[test]
    fn test_backup_guard() {
        let guard = BackupSelectedGuard;
        let err = guard.check(&RunFacts::default()).unwrap_err();
        assert!(err.to_string().contains("backup must be selected"));
    }
}
