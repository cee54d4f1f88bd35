//! # Rollback Configuration
//!
//! Everything the orchestrator needs to know about its targets is passed in
//! through [`RollbackConfig`]; nothing reads ambient environment variables
//! once the configuration is built.
//!
//! Precedence (highest to lowest):
//! 1. `ROLLBACK__<SECTION>__<KEY>` environment variables
//! 2. Config file (`--config`, else `./rollback.toml`, else `./config/rollback.toml`)
//! 3. Default values
//!
//! `PGPASSWORD` is used for the database password when none is configured.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{defaults, env};
use crate::error::{Result, RollbackError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// Credentials and tools for the live data store
    pub data_store: DataStoreConfig,
    /// The service being rolled back
    pub service: ServiceTargetConfig,
    /// How health is checked after the restart
    pub health: HealthEndpointConfig,
    pub retry_budget: RetryBudget,
    /// Where backups and pre-rollback snapshots live
    pub backup_directory: PathBuf,
    /// File extensions recognised as backups
    pub backup_extensions: Vec<String>,
    pub snapshot_prefix: String,
    /// Restart the service at its current version when a run aborts after stopping it
    pub resume_on_abort: bool,
    /// Kill external tools that run longer than this
    pub command_timeout_secs: Option<u64>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataStoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: String,
    pub password: Option<String>,
    pub pg_dump_bin: String,
    pub psql_bin: String,
    /// Used for custom-format archives instead of `psql`
    pub pg_restore_bin: String,
    /// Appended to every `pg_dump` invocation, e.g. `--no-owner`
    pub extra_dump_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTargetConfig {
    pub docker_bin: String,
    pub compose_file: PathBuf,
    pub project_name: Option<String>,
    pub service_name: String,
    /// Variable the compose file reads the image tag from
    pub image_tag_env: String,
    /// Version currently deployed; default rollback target
    pub current_version: String,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthEndpointConfig {
    pub url: String,
    pub timeout_ms: u64,
    /// External health-check command; replaces the HTTP probe when set
    pub command: Option<Vec<String>>,
}

/// Bounded polling budget for the health verifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudget {
    pub attempts: u32,
    pub interval_ms: u64,
    /// Consecutive successful probes needed to pass
    pub required_consecutive: u32,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            data_store: DataStoreConfig::default(),
            service: ServiceTargetConfig::default(),
            health: HealthEndpointConfig::default(),
            retry_budget: RetryBudget::default(),
            backup_directory: PathBuf::from(defaults::BACKUP_DIRECTORY),
            backup_extensions: defaults::BACKUP_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            snapshot_prefix: defaults::SNAPSHOT_PREFIX.to_string(),
            resume_on_abort: true,
            command_timeout_secs: None,
        }
    }
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            host: defaults::PG_HOST.to_string(),
            port: defaults::PG_PORT,
            user: defaults::PG_USER.to_string(),
            database: defaults::PG_DATABASE.to_string(),
            password: None,
            pg_dump_bin: defaults::PG_DUMP_BIN.to_string(),
            psql_bin: defaults::PSQL_BIN.to_string(),
            pg_restore_bin: defaults::PG_RESTORE_BIN.to_string(),
            extra_dump_args: defaults::PG_DUMP_EXTRA_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        }
    }
}

impl fmt::Debug for DataStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("pg_dump_bin", &self.pg_dump_bin)
            .field("psql_bin", &self.psql_bin)
            .field("pg_restore_bin", &self.pg_restore_bin)
            .field("extra_dump_args", &self.extra_dump_args)
            .finish()
    }
}

impl Default for ServiceTargetConfig {
    fn default() -> Self {
        Self {
            docker_bin: defaults::DOCKER_BIN.to_string(),
            compose_file: PathBuf::from(defaults::COMPOSE_FILE),
            project_name: None,
            service_name: defaults::SERVICE_NAME.to_string(),
            image_tag_env: defaults::IMAGE_TAG_ENV.to_string(),
            current_version: defaults::CURRENT_VERSION.to_string(),
            working_dir: None,
        }
    }
}

impl Default for HealthEndpointConfig {
    fn default() -> Self {
        Self {
            url: defaults::HEALTH_URL.to_string(),
            timeout_ms: defaults::HEALTH_TIMEOUT_MS,
            command: None,
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            attempts: defaults::RETRY_ATTEMPTS,
            interval_ms: defaults::RETRY_INTERVAL_MS,
            required_consecutive: defaults::REQUIRED_CONSECUTIVE_SUCCESSES,
        }
    }
}

impl RetryBudget {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl HealthEndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RollbackConfig {
    /// Load configuration from an explicit file, or from the standard locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(RollbackError::Configuration(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!("Loading config from: {}", path.display());
                builder = builder.add_source(File::from(path));
            }
            None => {
                if let Some(found) = Self::find_config_file() {
                    debug!("Loading config from: {}", found.display());
                    builder = builder.add_source(File::from(found));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(env::CONFIG_PREFIX)
                .prefix_separator(env::CONFIG_SEPARATOR)
                .separator(env::CONFIG_SEPARATOR)
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply_env_fallbacks();
        config.validate()?;

        debug!(config = ?config, "Loaded rollback configuration");
        Ok(config)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        ["./rollback.toml", "./config/rollback.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    fn apply_env_fallbacks(&mut self) {
        if self.data_store.password.is_none() {
            if let Ok(password) = std::env::var(env::PG_PASSWORD) {
                self.data_store.password = Some(password);
            }
        }
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        let budget = &self.retry_budget;
        if budget.attempts == 0 {
            return Err(invalid("retry_budget.attempts must be at least 1"));
        }
        if budget.required_consecutive == 0 {
            return Err(invalid("retry_budget.required_consecutive must be at least 1"));
        }
        if budget.required_consecutive > budget.attempts {
            return Err(invalid(format!(
                "retry_budget.required_consecutive ({}) exceeds retry_budget.attempts ({})",
                budget.required_consecutive, budget.attempts
            )));
        }

        match &self.health.command {
            Some(command) if command.is_empty() || command[0].trim().is_empty() => {
                return Err(invalid("health.command must name a program"));
            }
            Some(_) => {}
            None => {
                reqwest::Url::parse(&self.health.url).map_err(|e| {
                    invalid(format!("health.url '{}' is not a valid URL: {e}", self.health.url))
                })?;
            }
        }
        if self.health.timeout_ms == 0 {
            return Err(invalid("health.timeout_ms must be greater than 0"));
        }

        if self.service.service_name.trim().is_empty() {
            return Err(invalid("service.service_name must not be empty"));
        }
        if self.service.current_version.trim().is_empty() {
            return Err(invalid("service.current_version must not be empty"));
        }
        if self.data_store.database.trim().is_empty() {
            return Err(invalid("data_store.database must not be empty"));
        }
        if self.backup_directory.as_os_str().is_empty() {
            return Err(invalid("backup_directory must not be empty"));
        }
        if self.backup_extensions.is_empty() {
            return Err(invalid("backup_extensions must list at least one extension"));
        }
        if self.snapshot_prefix.is_empty() || self.snapshot_prefix.contains(['/', '\\']) {
            return Err(invalid(
                "snapshot_prefix must be a non-empty file name prefix",
            ));
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(message: impl Into<String>) -> RollbackError {
    RollbackError::Configuration(message.into())
}
