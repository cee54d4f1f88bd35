//! Scripted collaborators for driving the orchestrator without real tools.
//!
//! Every mock appends to one shared [`CallLog`] so tests can assert both which
//! side effects happened and in which order.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use rollback_core::config::{RetryBudget, RollbackConfig};
use rollback_core::execution::CommandOutput;
use rollback_core::{
    DataStore, HealthProbe, ProbeError, Prompter, RollbackOrchestrator, ServiceControl,
    ToolFailure,
};
use rollback_core::models::BackupRecord;

/// Ordered record of side-effecting calls, e.g. `["stop", "dump", "restore"]`
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.0.lock().iter().any(|c| c == call)
    }
}

fn output(command: &str, exit_code: i32) -> CommandOutput {
    CommandOutput {
        command: command.to_string(),
        exit_code: Some(exit_code),
        stdout: String::new(),
        stderr: if exit_code == 0 {
            String::new()
        } else {
            format!("{command}: simulated failure")
        },
        duration_ms: 1,
        started_at: Utc::now(),
    }
}

fn exit(command: &str, exit_code: i32) -> Result<CommandOutput, ToolFailure> {
    let output = output(command, exit_code);
    if output.success() {
        Ok(output)
    } else {
        Err(ToolFailure::Exited(output))
    }
}

pub struct MockDataStore {
    log: CallLog,
    pub dump_exit: i32,
    pub restore_exit: i32,
    pub restored: Mutex<Vec<PathBuf>>,
}

impl MockDataStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            dump_exit: 0,
            restore_exit: 0,
            restored: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DataStore for MockDataStore {
    fn describe(&self) -> String {
        "mock://data-store".to_string()
    }

    async fn dump(&self, destination: &Path) -> Result<CommandOutput, ToolFailure> {
        self.log.push("dump");
        std::fs::write(destination, "-- pg_dump output\nCREATE TABLE feeds ();\n")
            .expect("mock dump could not write");
        exit("pg_dump", self.dump_exit)
    }

    async fn restore(&self, source: &Path) -> Result<CommandOutput, ToolFailure> {
        self.log.push("restore");
        self.restored.lock().push(source.to_path_buf());
        exit("psql", self.restore_exit)
    }
}

pub struct MockService {
    log: CallLog,
    pub current_version: String,
    pub stop_fails: bool,
    pub start_fails: bool,
    /// Flag to raise while stopping, simulating an operator interrupt
    pub cancel_on_stop: Option<Arc<AtomicBool>>,
}

impl MockService {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            current_version: "v2.0.0".to_string(),
            stop_fails: false,
            start_fails: false,
            cancel_on_stop: None,
        }
    }
}

#[async_trait]
impl ServiceControl for MockService {
    fn service_name(&self) -> &str {
        "app"
    }

    fn current_version(&self) -> String {
        self.current_version.clone()
    }

    async fn stop(&self) -> Result<CommandOutput, ToolFailure> {
        self.log.push("stop");
        if let Some(flag) = &self.cancel_on_stop {
            flag.store(true, Ordering::SeqCst);
        }
        exit("docker compose stop app", i32::from(self.stop_fails))
    }

    async fn start_at_version(&self, version: &str) -> Result<CommandOutput, ToolFailure> {
        self.log.push(format!("start:{version}"));
        exit("docker compose up -d app", i32::from(self.start_fails))
    }

    async fn resume(&self) -> Result<CommandOutput, ToolFailure> {
        self.log.push("resume");
        exit("docker compose start app", 0)
    }
}

pub struct MockHealthProbe {
    log: CallLog,
    /// Scripted results, consumed in order
    pub results: Mutex<VecDeque<bool>>,
    /// Result once the script is exhausted
    pub healthy: bool,
}

impl MockHealthProbe {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            results: Mutex::new(VecDeque::new()),
            healthy: true,
        }
    }
}

#[async_trait]
impl HealthProbe for MockHealthProbe {
    fn target(&self) -> String {
        "mock://health".to_string()
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        self.log.push("probe");
        let healthy = self.results.lock().pop_front().unwrap_or(self.healthy);
        if healthy {
            Ok(())
        } else {
            Err(ProbeError("HTTP 503 Service Unavailable".to_string()))
        }
    }
}

/// Prompter with fixed answers that records every question it is asked
#[derive(Default)]
pub struct ScriptedPrompter {
    pub choice: Option<usize>,
    pub confirm: bool,
    pub version: Option<String>,
    pub questions: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn confirming() -> Self {
        Self {
            confirm: true,
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }
}

impl Prompter for ScriptedPrompter {
    fn select_backup(&self, candidates: &[BackupRecord]) -> Option<usize> {
        self.questions
            .lock()
            .push(format!("select among {}", candidates.len()));
        self.choice
    }

    fn confirm(&self, message: &str) -> bool {
        self.questions.lock().push(message.to_string());
        self.confirm
    }

    fn target_version(&self, _default: &str) -> Option<String> {
        self.version.clone()
    }
}

/// Backup directory, collaborators and configuration for one run
pub struct Scenario {
    pub dir: TempDir,
    pub log: CallLog,
    pub data_store: MockDataStore,
    pub service: MockService,
    pub health: MockHealthProbe,
    pub config: RollbackConfig,
}

impl Scenario {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let log = CallLog::default();
        let config = RollbackConfig {
            backup_directory: dir.path().to_path_buf(),
            retry_budget: RetryBudget {
                attempts: 3,
                interval_ms: 0,
                required_consecutive: 1,
            },
            ..Default::default()
        };
        Self {
            data_store: MockDataStore::new(log.clone()),
            service: MockService::new(log.clone()),
            health: MockHealthProbe::new(log.clone()),
            dir,
            log,
            config,
        }
    }

    /// Write a backup file into the backup directory
    pub fn backup(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, format!("-- backup {name}\n")).expect("write backup");
        path
    }

    pub fn build(self) -> Built {
        let data_store = Arc::new(self.data_store);
        let orchestrator = RollbackOrchestrator::new(
            self.config,
            data_store.clone(),
            Arc::new(self.service),
            Arc::new(self.health),
        );
        Built {
            dir: self.dir,
            log: self.log,
            data_store,
            orchestrator,
        }
    }
}

pub struct Built {
    pub dir: TempDir,
    pub log: CallLog,
    pub data_store: Arc<MockDataStore>,
    pub orchestrator: RollbackOrchestrator,
}
