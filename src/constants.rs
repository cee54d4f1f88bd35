//! # System Constants
//!
//! Event names, exit codes and defaults that define the operational
//! boundaries of a rollback run.

/// Events published on the [`EventPublisher`](crate::events::EventPublisher)
pub mod events {
    pub const ROLLBACK_STARTED: &str = "rollback.started";
    pub const ROLLBACK_STAGE_TRANSITION: &str = "rollback.stage_transition";
    pub const ROLLBACK_FINISHED: &str = "rollback.finished";
    pub const ROLLBACK_SERVICE_RESUMED: &str = "rollback.service_resumed";
}

/// Process exit codes reported by the `rollback` binary
pub mod exit_codes {
    /// The rollback completed and the service is healthy
    pub const SUCCESS: i32 = 0;
    /// Nothing destructive happened, or the run never started
    pub const ABORTED: i32 = 1;
    /// Data was changed but the service could not be confirmed healthy
    pub const DEGRADED: i32 = 2;
}

/// Default values used when configuration leaves a field out
pub mod defaults {
    pub const BACKUP_DIRECTORY: &str = "./backups";
    pub const BACKUP_EXTENSIONS: &[&str] = &["sql", "dump"];
    pub const SNAPSHOT_PREFIX: &str = "pre_rollback";
    pub const SNAPSHOT_EXTENSION: &str = "sql";
    /// `strftime` layout embedded in snapshot names, second resolution
    pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
    /// Separator between the timestamp and the version tag in a backup name
    pub const VERSION_SEPARATOR: &str = "__";

    pub const PG_DUMP_BIN: &str = "pg_dump";
    /// Snapshots drop existing objects first so they can be replayed onto a live database
    pub const PG_DUMP_EXTRA_ARGS: &[&str] = &["--clean", "--if-exists"];
    pub const PSQL_BIN: &str = "psql";
    pub const PG_RESTORE_BIN: &str = "pg_restore";
    /// Leading bytes of a `pg_dump -Fc` archive
    pub const PG_ARCHIVE_MAGIC: &[u8] = b"PGDMP";
    pub const PG_HOST: &str = "localhost";
    pub const PG_PORT: u16 = 5432;
    pub const PG_USER: &str = "postgres";
    pub const PG_DATABASE: &str = "postgres";

    pub const DOCKER_BIN: &str = "docker";
    pub const COMPOSE_FILE: &str = "docker-compose.yml";
    pub const SERVICE_NAME: &str = "app";
    pub const IMAGE_TAG_ENV: &str = "IMAGE_TAG";
    pub const CURRENT_VERSION: &str = "latest";

    pub const HEALTH_URL: &str = "http://localhost:8080/health";
    pub const HEALTH_TIMEOUT_MS: u64 = 5_000;

    pub const RETRY_ATTEMPTS: u32 = 10;
    pub const RETRY_INTERVAL_MS: u64 = 3_000;
    pub const REQUIRED_CONSECUTIVE_SUCCESSES: u32 = 2;
}

/// Environment variable names consulted outside the `ROLLBACK__*` layer
pub mod env {
    /// Prefix for layered configuration overrides, e.g. `ROLLBACK__HEALTH__URL`
    pub const CONFIG_PREFIX: &str = "ROLLBACK";
    pub const CONFIG_SEPARATOR: &str = "__";
    /// Standard libpq password variable, used when no password is configured
    pub const PG_PASSWORD: &str = "PGPASSWORD";
    pub const ROLLBACK_ENV: &str = "ROLLBACK_ENV";
}
