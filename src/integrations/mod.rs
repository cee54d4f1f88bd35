//! # Integrations
//!
//! Production implementations of the orchestration seams. Everything that
//! spawns a process goes through a [`CommandRunner`] so the exact command
//! lines can be checked in tests without the real tools installed.

pub mod docker_compose;
pub mod health;
pub mod postgres;
pub mod prompt;

pub use docker_compose::DockerComposeService;
pub use health::{CommandHealthProbe, HttpHealthProbe};
pub use postgres::PostgresDataStore;
pub use prompt::{NonInteractivePrompter, TerminalPrompter};

use crate::error::ToolFailure;
use crate::execution::{CommandOutput, CommandRunner, CommandSpec};

/// Run `spec` and treat any non-zero exit as a failure
pub(crate) async fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
) -> Result<CommandOutput, ToolFailure> {
    let output = runner.run(spec).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(ToolFailure::Exited(output))
    }
}
