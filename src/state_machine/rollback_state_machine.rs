use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::RollbackEvent,
    guards::{BackupSelectedGuard, RunFacts, SnapshotRecordedGuard, StateGuard},
    states::RollbackStage,
};
use crate::constants::events::ROLLBACK_STAGE_TRANSITION;
use crate::events::EventPublisher;
use crate::logging::log_stage_operation;

/// One recorded move between stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: RollbackStage,
    pub to: RollbackStage,
    pub event: String,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// State machine for a single rollback run
///
/// Any failure before `Restoring` ends the run `Aborted`; any failure at or
/// after `Restoring` ends it `Degraded`. Entering `Restoring` requires a
/// recorded pre-rollback snapshot.
pub struct RollbackStateMachine {
    run_id: Uuid,
    current: RollbackStage,
    facts: RunFacts,
    history: Vec<StageTransition>,
    event_publisher: EventPublisher,
}

impl RollbackStateMachine {
    /// Create a new state machine in the `Idle` stage
    pub fn new(run_id: Uuid, event_publisher: EventPublisher) -> Self {
        Self {
            run_id,
            current: RollbackStage::default(),
            facts: RunFacts::default(),
            history: Vec::new(),
            event_publisher,
        }
    }

    pub fn current_state(&self) -> RollbackStage {
        self.current
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn history(&self) -> &[StageTransition] {
        &self.history
    }

    pub fn facts(&self) -> &RunFacts {
        &self.facts
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Record that the backup to restore has been chosen
    pub fn record_backup_selected(&mut self) {
        self.facts.backup_selected = true;
    }

    /// Record that the pre-rollback snapshot has been written
    pub fn record_snapshot(&mut self) {
        self.facts.snapshot_recorded = true;
    }

    /// Last non-terminal stage the run was in
    ///
    /// For a finished run this is the stage that failed, or `VerifyingHealth`
    /// on success.
    pub fn stage_reached(&self) -> RollbackStage {
        if !self.current.is_terminal() {
            return self.current;
        }
        self.history
            .last()
            .map(|transition| transition.from)
            .unwrap_or(self.current)
    }

    /// Attempt to transition the run
    pub async fn transition(&mut self, event: RollbackEvent) -> StateMachineResult<RollbackStage> {
        let from = self.current;
        let to = self.determine_target_state(from, &event)?;

        self.check_guards(from, to)?;

        self.current = to;
        self.history.push(StageTransition {
            from,
            to,
            event: event.event_type().to_string(),
            error: event.error_message().map(str::to_string),
            at: Utc::now(),
        });

        log_stage_operation(
            self.run_id,
            &from.to_string(),
            &to.to_string(),
            event.event_type(),
            event.error_message(),
        );

        let payload = json!({
            "run_id": self.run_id,
            "from": from,
            "to": to,
            "event": event,
        });
        if let Err(e) = self
            .event_publisher
            .publish(ROLLBACK_STAGE_TRANSITION, payload)
            .await
        {
            warn!(run_id = %self.run_id, error = %e, "Failed to publish stage transition");
        }

        Ok(to)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        &self,
        current_state: RollbackStage,
        event: &RollbackEvent,
    ) -> StateMachineResult<RollbackStage> {
        let target = match (current_state, event) {
            // Forward progress
            (RollbackStage::Idle, RollbackEvent::Begin) => RollbackStage::LocatingBackup,
            (RollbackStage::LocatingBackup, RollbackEvent::BackupLocated) => {
                RollbackStage::StoppingService
            }
            (RollbackStage::StoppingService, RollbackEvent::ServiceStopped) => {
                RollbackStage::Snapshotting
            }
            (RollbackStage::Snapshotting, RollbackEvent::SnapshotTaken) => RollbackStage::Restoring,
            (RollbackStage::Restoring, RollbackEvent::RestoreApplied) => {
                RollbackStage::RestartingService
            }
            (RollbackStage::RestartingService, RollbackEvent::ServiceStarted) => {
                RollbackStage::VerifyingHealth
            }
            (RollbackStage::VerifyingHealth, RollbackEvent::HealthConfirmed) => {
                RollbackStage::Success
            }

            // Failure routing depends only on whether data may have changed
            (stage, RollbackEvent::Fail(_)) if stage.is_pre_destructive() => RollbackStage::Aborted,
            (stage, RollbackEvent::Fail(_)) if stage.has_touched_data() => RollbackStage::Degraded,

            // Operator cancel, only before the restore begins
            (stage, RollbackEvent::Cancel) if stage.allows_cancel() => RollbackStage::Aborted,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    fn check_guards(&self, from: RollbackStage, to: RollbackStage) -> StateMachineResult<()> {
        let guard: &dyn StateGuard = match (from, to) {
            (RollbackStage::LocatingBackup, RollbackStage::StoppingService) => &BackupSelectedGuard,
            (RollbackStage::Snapshotting, RollbackStage::Restoring) => &SnapshotRecordedGuard,
            _ => return Ok(()),
        };

        guard.check(&self.facts).map_err(|e| {
            warn!(
                run_id = %self.run_id,
                guard = guard.description(),
                from = %from,
                to = %to,
                "Transition blocked by guard"
            );
            StateMachineError::GuardFailed {
                from,
                reason: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> RollbackStateMachine {
        RollbackStateMachine::new(Uuid::new_v4(), EventPublisher::default())
    }

    #[test]
    fn test_forward_transitions() {
        let sm = machine();

        assert_eq!(
            sm.determine_target_state(RollbackStage::Idle, &RollbackEvent::Begin)
                .unwrap(),
            RollbackStage::LocatingBackup
        );
        assert_eq!(
            sm.determine_target_state(RollbackStage::Snapshotting, &RollbackEvent::SnapshotTaken)
                .unwrap(),
            RollbackStage::Restoring
        );
        assert_eq!(
            sm.determine_target_state(
                RollbackStage::VerifyingHealth,
                &RollbackEvent::HealthConfirmed
            )
            .unwrap(),
            RollbackStage::Success
        );
    }

    #[test]
    fn test_failure_routing() {
        let sm = machine();
        let fail = RollbackEvent::fail_with_error("boom");

        assert_eq!(
            sm.determine_target_state(RollbackStage::Snapshotting, &fail)
                .unwrap(),
            RollbackStage::Aborted
        );
        assert_eq!(
            sm.determine_target_state(RollbackStage::Restoring, &fail)
                .unwrap(),
            RollbackStage::Degraded
        );
        assert_eq!(
            sm.determine_target_state(RollbackStage::VerifyingHealth, &fail)
                .unwrap(),
            RollbackStage::Degraded
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = machine();

        // Skipping the snapshot stage is not possible
        assert!(sm
            .determine_target_state(RollbackStage::StoppingService, &RollbackEvent::SnapshotTaken)
            .is_err());
        // Terminal stages accept nothing
        assert!(sm
            .determine_target_state(RollbackStage::Aborted, &RollbackEvent::Begin)
            .is_err());
        assert!(sm
            .determine_target_state(RollbackStage::Success, &RollbackEvent::fail_with_error("x"))
            .is_err());
        // No cancelling once data may have changed
        assert!(sm
            .determine_target_state(RollbackStage::Restoring, &RollbackEvent::Cancel)
            .is_err());
    }

    #[tokio::test]
    async fn test_restore_requires_snapshot() {
        let mut sm = machine();
        sm.transition(RollbackEvent::Begin).await.unwrap();
        sm.record_backup_selected();
        sm.transition(RollbackEvent::BackupLocated).await.unwrap();
        sm.transition(RollbackEvent::ServiceStopped).await.unwrap();

        let err = sm.transition(RollbackEvent::SnapshotTaken).await.unwrap_err();
        assert!(matches!(
            err,
            StateMachineError::GuardFailed {
                from: RollbackStage::Snapshotting,
                ..
            }
        ));
        assert_eq!(sm.current_state(), RollbackStage::Snapshotting);

        sm.record_snapshot();
        assert_eq!(
            sm.transition(RollbackEvent::SnapshotTaken).await.unwrap(),
            RollbackStage::Restoring
        );
    }

    #[tokio::test]
    async fn test_history_and_stage_reached() {
        let mut sm = machine();
        sm.transition(RollbackEvent::Begin).await.unwrap();
        sm.transition(RollbackEvent::fail_with_error("no backups"))
            .await
            .unwrap();

        assert_eq!(sm.current_state(), RollbackStage::Aborted);
        assert_eq!(sm.stage_reached(), RollbackStage::LocatingBackup);
        assert_eq!(sm.history().len(), 2);
        assert_eq!(sm.history()[1].error.as_deref(), Some("no backups"));
        assert!(sm.is_terminal());
    }
}
