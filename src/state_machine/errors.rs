use thiserror::Error;

use super::states::RollbackStage;

/// Error types for rollback state machine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Guard condition failed in {from}: {reason}")]
    GuardFailed { from: RollbackStage, reason: String },

    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: RollbackStage, event: String },
}

impl StateMachineError {
    /// Stage the machine was in when the transition was refused
    pub fn stage(&self) -> RollbackStage {
        match self {
            Self::GuardFailed { from, .. } | Self::InvalidTransition { from, .. } => *from,
        }
    }
}

/// Specific error type for guard condition failures
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Precondition not met: {rule}")]
    PreconditionNotMet { rule: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

/// Helper function to create a precondition failure
pub fn precondition_not_met(rule: impl Into<String>) -> GuardError {
    GuardError::PreconditionNotMet { rule: rule.into() }
}
