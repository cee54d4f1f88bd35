// State machine for a rollback run
//
// A single sequential machine: each stage must finish before the next starts,
// and failure routing depends only on whether the restore has begun.

pub mod errors;
pub mod events;
pub mod guards;
pub mod rollback_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::RollbackEvent;
pub use guards::{RunFacts, StateGuard};
pub use rollback_state_machine::{RollbackStateMachine, StageTransition};
pub use states::RollbackStage;
