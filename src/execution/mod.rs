//! External process execution used by every side-effecting adapter.

pub mod command;

pub use command::{CommandError, CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
