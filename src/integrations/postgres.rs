//! PostgreSQL dump and restore through `pg_dump` and `psql`.
//!
//! Plain SQL backups are replayed with `psql`. Custom-format archives
//! (`pg_dump -Fc`, recognised by their `PGDMP` header) go to `pg_restore`.
//!
//! The password never appears on a command line: it is handed to the child
//! process as `PGPASSWORD` and both tools run with `-w` so a missing password
//! fails fast instead of hanging on a prompt.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::run_checked;
use crate::config::DataStoreConfig;
use crate::constants::defaults::PG_ARCHIVE_MAGIC;
use crate::constants::env::PG_PASSWORD;
use crate::error::ToolFailure;
use crate::execution::{CommandOutput, CommandRunner, CommandSpec};
use crate::orchestration::types::DataStore;

pub struct PostgresDataStore {
    config: DataStoreConfig,
    runner: Arc<dyn CommandRunner>,
}

impl PostgresDataStore {
    pub fn new(config: DataStoreConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    pub fn dump_command(&self, destination: &Path) -> CommandSpec {
        let spec = self
            .connection_args(CommandSpec::new(&self.config.pg_dump_bin))
            .arg("-f")
            .arg(destination.to_string_lossy())
            .args(self.config.extra_dump_args.iter().cloned());
        self.with_password(spec)
    }

    /// Replays a plain SQL dump in one transaction, stopping at the first error
    pub fn restore_command(&self, source: &Path) -> CommandSpec {
        let spec = self
            .connection_args(CommandSpec::new(&self.config.psql_bin))
            .args(["-v", "ON_ERROR_STOP=1", "--single-transaction", "-f"])
            .arg(source.to_string_lossy());
        self.with_password(spec)
    }

    /// Restores a custom-format archive, dropping existing objects first
    pub fn archive_restore_command(&self, source: &Path) -> CommandSpec {
        let spec = self
            .connection_args(CommandSpec::new(&self.config.pg_restore_bin))
            .args([
                "--clean",
                "--if-exists",
                "--single-transaction",
                "--exit-on-error",
            ])
            .arg(source.to_string_lossy());
        self.with_password(spec)
    }

    fn connection_args(&self, spec: CommandSpec) -> CommandSpec {
        spec.arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("-U")
            .arg(&self.config.user)
            .arg("-d")
            .arg(&self.config.database)
            .arg("-w")
    }

    fn with_password(&self, spec: CommandSpec) -> CommandSpec {
        match &self.config.password {
            Some(password) => spec.secret_env(PG_PASSWORD, password),
            None => spec,
        }
    }
}

#[async_trait]
impl DataStore for PostgresDataStore {
    fn describe(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.config.user, self.config.host, self.config.port, self.config.database
        )
    }

    async fn dump(&self, destination: &Path) -> Result<CommandOutput, ToolFailure> {
        run_checked(self.runner.as_ref(), &self.dump_command(destination)).await
    }

    async fn restore(&self, source: &Path) -> Result<CommandOutput, ToolFailure> {
        let spec = if is_custom_archive(source).await {
            debug!(backup = %source.display(), "Custom-format archive, restoring with pg_restore");
            self.archive_restore_command(source)
        } else {
            self.restore_command(source)
        };
        run_checked(self.runner.as_ref(), &spec).await
    }
}

/// Unreadable files count as plain SQL and fail in `psql` with its own message
async fn is_custom_archive(path: &Path) -> bool {
    let Ok(mut file) = tokio::fs::File::open(path).await else {
        return false;
    };
    let mut header = [0u8; 5];
    match file.read_exact(&mut header).await {
        Ok(_) => header == PG_ARCHIVE_MAGIC,
        Err(_) => false,
    }
}
