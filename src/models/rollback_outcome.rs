//! # Rollback Outcome
//!
//! The result record of one run. It is produced exactly once, surfaced to the
//! caller and the log, and never persisted by the orchestrator.
//!
//! If the run entered `Restoring`, `pre_rollback_snapshot` is always set:
//! that snapshot is the operator's way back when anything after it fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use uuid::Uuid;

use super::BackupRecord;
use crate::error::{ErrorKind, ErrorPhase, RollbackError};
use crate::execution::CommandOutput;
use crate::state_machine::{RollbackStage, StageTransition};

/// Error detail carried by a failed outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub phase: ErrorPhase,
    pub message: String,
    /// Raw output of the failing tool, when one ran
    pub output: Option<CommandOutput>,
}

impl From<&RollbackError> for OutcomeError {
    fn from(err: &RollbackError) -> Self {
        Self {
            kind: err.kind(),
            phase: err.phase(),
            message: err.to_string(),
            output: err.tool_output().cloned(),
        }
    }
}

/// Result of a health verification pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub attempts: u32,
    pub consecutive_successes: u32,
    pub required_consecutive: u32,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub run_id: Uuid,
    /// `Success`, `Degraded` or `Aborted`
    pub terminal_state: RollbackStage,
    /// Last active stage: where the run failed, or `VerifyingHealth` on success
    pub stage_reached: RollbackStage,
    pub success: bool,
    pub restored_backup: Option<BackupRecord>,
    pub pre_rollback_snapshot: Option<BackupRecord>,
    pub target_version: Option<String>,
    pub service_stopped: bool,
    pub data_restored: bool,
    pub service_started: bool,
    /// Result of the best-effort restart after an abort, if one was attempted
    pub service_resumed: Option<bool>,
    pub health: Option<HealthReport>,
    pub error: Option<OutcomeError>,
    pub transitions: Vec<StageTransition>,
    pub requested_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RollbackOutcome {
    /// Process exit code: 0 success, 1 aborted, 2 degraded
    pub fn exit_code(&self) -> i32 {
        self.terminal_state
            .exit_code()
            .unwrap_or(crate::constants::exit_codes::ABORTED)
    }

    /// Degraded runs changed data without a clean finish
    pub fn requires_manual_intervention(&self) -> bool {
        self.terminal_state == RollbackStage::Degraded
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Operator-facing report
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let verdict = match self.terminal_state {
            RollbackStage::Success => "SUCCESS",
            RollbackStage::Degraded => "DEGRADED",
            _ => "ABORTED",
        };
        let _ = writeln!(
            out,
            "Rollback {}: {} (stage reached: {})",
            self.run_id, verdict, self.stage_reached
        );

        if let Some(backup) = &self.restored_backup {
            let _ = writeln!(out, "  Backup:                {}", backup.location.display());
        }
        if let Some(version) = &self.target_version {
            let _ = writeln!(out, "  Target version:        {version}");
        }
        if let Some(snapshot) = &self.pre_rollback_snapshot {
            let _ = writeln!(out, "  Pre-rollback snapshot: {}", snapshot.location.display());
        }
        if let Some(health) = &self.health {
            let _ = writeln!(
                out,
                "  Health:                {}/{} consecutive successes after {} attempts",
                health.consecutive_successes, health.required_consecutive, health.attempts
            );
        }
        if let Some(resumed) = self.service_resumed {
            let state = if resumed { "restarted" } else { "could not be restarted" };
            let _ = writeln!(out, "  Service:               {state} at its previous version");
        }
        if let Some(error) = &self.error {
            let _ = writeln!(out, "  Error [{}]: {}", error.kind, error.message);
            if let Some(output) = &error.output {
                let diagnostics = output.diagnostics();
                if !diagnostics.is_empty() {
                    let _ = writeln!(out, "  Tool output ({}):", output.exit_status());
                    for line in diagnostics.lines() {
                        let _ = writeln!(out, "    {line}");
                    }
                }
            }
        }

        if self.requires_manual_intervention() {
            let _ = writeln!(out, "  MANUAL INTERVENTION REQUIRED:");
            if self.data_restored && !self.service_started {
                let _ = writeln!(out, "    data restored, service not started");
            }
            if let Some(snapshot) = &self.pre_rollback_snapshot {
                let _ = writeln!(
                    out,
                    "    the pre-rollback state can be re-applied from {}",
                    snapshot.location.display()
                );
            }
        }

        out
    }
}
