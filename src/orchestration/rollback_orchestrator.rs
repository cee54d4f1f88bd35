//! # Rollback Orchestrator
//!
//! Drives one rollback run through the stage machine:
//!
//! ```text
//! Idle → LocatingBackup → StoppingService → Snapshotting → Restoring
//!      → RestartingService → VerifyingHealth → {Success | Degraded | Aborted}
//! ```
//!
//! Every stage is a `Result`-returning call; the first error ends the run. An
//! error before `Restoring` ends it `Aborted` (no data touched), an error at
//! or after `Restoring` ends it `Degraded`. Nothing after the restore is ever
//! retried or reversed automatically: the outcome carries the pre-rollback
//! snapshot location and the failing tool's output for the operator instead.
//!
//! The caller is responsible for holding whatever lock keeps other deploys
//! away from the same target for the duration of [`RollbackOrchestrator::run`].

use chrono::Utc;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::RollbackConfig;
use crate::constants::events::{ROLLBACK_FINISHED, ROLLBACK_SERVICE_RESUMED, ROLLBACK_STARTED};
use crate::error::{Result, RollbackError};
use crate::events::EventPublisher;
use crate::execution::{CommandOutput, CommandRunner, SystemCommandRunner};
use crate::integrations::{health::probe_from_config, DockerComposeService, PostgresDataStore};
use crate::logging::log_tool_operation;
use crate::models::{BackupRecord, HealthReport, OutcomeError, RollbackOutcome, RollbackRequest};
use crate::orchestration::backup_locator::BackupLocator;
use crate::orchestration::health_verifier::HealthVerifier;
use crate::orchestration::restore_executor::RestoreExecutor;
use crate::orchestration::service_controller::ServiceController;
use crate::orchestration::snapshot_manager::SnapshotManager;
use crate::orchestration::types::{DataStore, HealthProbe, Prompter, ServiceControl};
use crate::state_machine::{RollbackEvent, RollbackStage, RollbackStateMachine};

pub struct RollbackOrchestrator {
    config: RollbackConfig,
    locator: BackupLocator,
    snapshots: SnapshotManager,
    restorer: RestoreExecutor,
    services: ServiceController,
    health: HealthVerifier,
    event_publisher: EventPublisher,
    cancelled: Arc<AtomicBool>,
}

/// What a run has done so far, folded into the outcome at the end
#[derive(Debug, Default)]
struct RunProgress {
    backup: Option<BackupRecord>,
    snapshot: Option<BackupRecord>,
    target_version: Option<String>,
    service_stopped: bool,
    data_restored: bool,
    service_started: bool,
    service_resumed: Option<bool>,
    health: Option<HealthReport>,
}

impl RollbackOrchestrator {
    pub fn new(
        config: RollbackConfig,
        data_store: Arc<dyn DataStore>,
        service: Arc<dyn ServiceControl>,
        health_probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            locator: BackupLocator::from_config(&config),
            snapshots: SnapshotManager::from_config(&config, data_store.clone()),
            restorer: RestoreExecutor::new(data_store),
            services: ServiceController::new(service),
            health: HealthVerifier::new(health_probe, config.retry_budget),
            event_publisher: EventPublisher::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    /// Wire the production adapters: `pg_dump`/`psql`, Docker Compose and the
    /// configured health probe, all running through one command runner.
    pub fn from_config(config: RollbackConfig) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(match config.command_timeout() {
            Some(timeout) => SystemCommandRunner::with_timeout(timeout),
            None => SystemCommandRunner::new(),
        });

        let data_store = Arc::new(PostgresDataStore::new(
            config.data_store.clone(),
            runner.clone(),
        ));
        let service = Arc::new(DockerComposeService::new(
            config.service.clone(),
            runner.clone(),
        ));
        let probe = probe_from_config(&config.health, runner)?;

        Ok(Self::new(config, data_store, service, probe))
    }

    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    /// Share a cancellation flag with the caller (e.g. a Ctrl-C handler)
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn config(&self) -> &RollbackConfig {
        &self.config
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Setting the returned flag cancels the run at the next pre-flight checkpoint
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Backups available for a run, newest first
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        self.locator.list_candidates()
    }

    /// Execute one rollback run to a terminal state
    ///
    /// Never returns an error: every failure is reported in the outcome.
    pub async fn run(&self, request: RollbackRequest, prompter: &dyn Prompter) -> RollbackOutcome {
        let mut machine = RollbackStateMachine::new(request.run_id, self.event_publisher.clone());
        let mut progress = RunProgress::default();

        info!(
            run_id = %request.run_id,
            backup = ?request.backup_path,
            target_version = ?request.target_version,
            service = %self.services.service_name(),
            "🚀 Starting rollback run"
        );
        self.publish(
            ROLLBACK_STARTED,
            json!({
                "run_id": request.run_id,
                "backup_path": request.backup_path,
                "target_version": request.target_version,
                "requested_at": request.requested_at,
            }),
        )
        .await;

        let failure = self
            .drive(&request, prompter, &mut machine, &mut progress)
            .await
            .err();

        if let Some(err) = &failure {
            self.fail_run(&mut machine, err).await;

            if machine.current_state() == RollbackStage::Aborted
                && progress.service_stopped
                && !progress.data_restored
                && self.config.resume_on_abort
            {
                let resumed = self.services.resume().await;
                progress.service_resumed = Some(resumed);
                self.publish(
                    ROLLBACK_SERVICE_RESUMED,
                    json!({ "run_id": request.run_id, "resumed": resumed }),
                )
                .await;
            }
        }

        let outcome = self.build_outcome(&request, &machine, progress, failure.as_ref());

        match outcome.terminal_state {
            RollbackStage::Success => info!(run_id = %outcome.run_id, "✅ Rollback completed"),
            RollbackStage::Degraded => error!(
                run_id = %outcome.run_id,
                stage = %outcome.stage_reached,
                "Rollback DEGRADED: manual intervention required"
            ),
            _ => warn!(run_id = %outcome.run_id, stage = %outcome.stage_reached, "Rollback aborted"),
        }

        if let Err(e) = self
            .event_publisher
            .publish_serialized(ROLLBACK_FINISHED, &outcome)
            .await
        {
            warn!(run_id = %outcome.run_id, error = %e, "Failed to publish rollback outcome");
        }

        outcome
    }

    async fn drive(
        &self,
        request: &RollbackRequest,
        prompter: &dyn Prompter,
        machine: &mut RollbackStateMachine,
        progress: &mut RunProgress,
    ) -> Result<()> {
        machine.transition(RollbackEvent::Begin).await?;
        self.check_cancelled()?;

        let backup = self
            .locator
            .locate(request.backup_path.as_deref(), prompter)?;
        progress.backup = Some(backup.clone());
        machine.record_backup_selected();

        let current_version = self.services.current_version();
        let version = self.resolve_target_version(request, prompter, &current_version);
        progress.target_version = Some(version.clone());

        self.check_cancelled()?;
        // An explicit backup path is the operator's confirmation
        if request.backup_path.is_none() {
            let question = format!(
                "Stop {}, restore {} and start version {}?",
                self.services.service_name(),
                backup.describe(),
                version
            );
            if !prompter.confirm(&question) {
                return Err(RollbackError::cancelled("operator declined the rollback"));
            }
        }
        machine.transition(RollbackEvent::BackupLocated).await?;

        let stopped = self.services.stop().await?;
        log_tool(request, RollbackStage::StoppingService, &stopped);
        progress.service_stopped = true;
        machine.transition(RollbackEvent::ServiceStopped).await?;
        self.check_cancelled()?;

        let snapshot = self.snapshots.take_snapshot(Some(&current_version)).await?;
        progress.snapshot = Some(snapshot.clone());
        machine.record_snapshot();
        self.check_cancelled()?;

        // Past this point the run can no longer be cancelled
        machine.transition(RollbackEvent::SnapshotTaken).await?;
        let restored = self.restorer.apply(&backup, &snapshot.location).await?;
        log_tool(request, RollbackStage::Restoring, &restored);
        progress.data_restored = true;
        machine.transition(RollbackEvent::RestoreApplied).await?;

        let started = self.services.start(&version, &snapshot.location).await?;
        log_tool(request, RollbackStage::RestartingService, &started);
        progress.service_started = true;
        machine.transition(RollbackEvent::ServiceStarted).await?;

        progress.health = Some(self.health.verify().await?);
        machine.transition(RollbackEvent::HealthConfirmed).await?;

        Ok(())
    }

    /// Explicit request, then the operator, then the current version
    fn resolve_target_version(
        &self,
        request: &RollbackRequest,
        prompter: &dyn Prompter,
        current_version: &str,
    ) -> String {
        request
            .target_version
            .clone()
            .or_else(|| prompter.target_version(current_version))
            .filter(|version| !version.trim().is_empty())
            .unwrap_or_else(|| current_version.to_string())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(RollbackError::cancelled("cancellation requested"))
        } else {
            Ok(())
        }
    }

    /// Route the machine to its terminal stage for `err`
    async fn fail_run(&self, machine: &mut RollbackStateMachine, err: &RollbackError) {
        if machine.is_terminal() {
            return;
        }

        let event = match err {
            RollbackError::Cancelled { .. } if machine.current_state().allows_cancel() => {
                RollbackEvent::Cancel
            }
            _ => RollbackEvent::fail_with_error(err.to_string()),
        };

        if let Err(e) = machine.transition(event).await {
            error!(
                run_id = %machine.run_id(),
                stage = %machine.current_state(),
                error = %e,
                "Could not record run failure"
            );
        }
    }

    fn build_outcome(
        &self,
        request: &RollbackRequest,
        machine: &RollbackStateMachine,
        progress: RunProgress,
        failure: Option<&RollbackError>,
    ) -> RollbackOutcome {
        let terminal_state = match machine.current_state() {
            stage if stage.is_terminal() => stage,
            _ if progress.data_restored => RollbackStage::Degraded,
            _ => RollbackStage::Aborted,
        };

        RollbackOutcome {
            run_id: request.run_id,
            terminal_state,
            stage_reached: machine.stage_reached(),
            success: terminal_state == RollbackStage::Success,
            restored_backup: progress.backup,
            pre_rollback_snapshot: progress.snapshot,
            target_version: progress.target_version,
            service_stopped: progress.service_stopped,
            data_restored: progress.data_restored,
            service_started: progress.service_started,
            service_resumed: progress.service_resumed,
            health: progress.health,
            error: failure.map(OutcomeError::from),
            transitions: machine.history().to_vec(),
            requested_at: request.requested_at,
            finished_at: Utc::now(),
        }
    }

    async fn publish(&self, name: &str, payload: serde_json::Value) {
        if let Err(e) = self.event_publisher.publish(name, payload).await {
            warn!(event = name, error = %e, "Failed to publish event");
        }
    }
}

fn log_tool(request: &RollbackRequest, stage: RollbackStage, output: &CommandOutput) {
    log_tool_operation(
        request.run_id,
        &stage.to_string(),
        &output.command,
        &output.exit_status(),
        Some(output.duration_ms),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceTargetConfig;
    use crate::execution::CommandSpec;
    use crate::integrations::testing::RecordingRunner;
    use crate::integrations::{CommandHealthProbe, NonInteractivePrompter};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_aborted_run_restarts_without_pulling() {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("2024-01-01.sql");
        std::fs::write(&backup, "-- backup\n").unwrap();

        let runner = Arc::new(RecordingRunner::default());
        // compose stop, compose ps (nothing running), then pg_dump fails
        runner.reply(0, "").reply(0, "").reply(1, "");

        let config = RollbackConfig {
            backup_directory: dir.path().to_path_buf(),
            service: ServiceTargetConfig {
                service_name: "app".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let orchestrator = RollbackOrchestrator::new(
            config.clone(),
            Arc::new(PostgresDataStore::new(
                config.data_store.clone(),
                runner.clone(),
            )),
            Arc::new(DockerComposeService::new(config.service.clone(), runner.clone())),
            Arc::new(CommandHealthProbe::new(
                CommandSpec::new("true"),
                runner.clone(),
                Duration::from_secs(1),
            )),
        );

        let outcome = orchestrator
            .run(
                RollbackRequest::default().with_backup(&backup),
                &NonInteractivePrompter::default(),
            )
            .await;

        assert_eq!(outcome.terminal_state, RollbackStage::Aborted);
        assert_eq!(outcome.service_resumed, Some(true));

        let commands = runner.rendered();
        assert!(commands.iter().all(|c| !c.contains(" pull ")));
        assert!(commands.iter().all(|c| !c.contains(" up ")));
        assert_eq!(
            commands.last().map(String::as_str),
            Some("docker compose -f docker-compose.yml start app")
        );
    }
}
