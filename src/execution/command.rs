//! # External Command Execution
//!
//! Every side effect of a rollback (dumping, restoring, stopping and starting
//! the service) happens in an external tool. This module runs those tools and
//! captures what they print so failures can be reported verbatim.
//!
//! The contract is the classic one: exit code 0 is success, anything else is
//! a failure. A non-zero exit is *not* an error at this layer; the caller gets
//! a [`CommandOutput`] and decides. Only failing to run the tool at all
//! (missing binary, timeout) is a [`CommandError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Description of one external process invocation
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Environment passed to the child but never printed
    pub secret_env: Vec<(String, String)>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn secret_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secret_env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering of the command line, safe to log
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of a non-secret environment variable set on this command
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret_keys: Vec<(&str, &str)> = self
            .secret_env
            .iter()
            .map(|(k, _)| (k.as_str(), "[REDACTED]"))
            .collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("secret_env", &secret_keys)
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

/// Captured result of a finished external process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Rendered command line (see [`CommandSpec::display`])
    pub command: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Most useful text for an operator: stderr if anything was written there,
    /// otherwise stdout.
    pub fn diagnostics(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }

    /// Human readable exit status
    pub fn exit_status(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Failure to run an external command at all
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` did not finish within {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
}

/// Seam over process execution so adapters can be tested without the real tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runs commands on the local machine with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    timeout: Option<Duration>,
}

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let rendered = spec.display();
        debug!(command = %rendered, "Running external command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in spec.env.iter().chain(spec.secret_env.iter()) {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let started_at = Utc::now();
        let start = Instant::now();

        let result = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %rendered, timeout_ms = timeout.as_millis() as u64, "External command timed out");
                    return Err(CommandError::Timeout {
                        command: rendered,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            },
            None => cmd.output().await,
        };

        let output = result.map_err(|source| CommandError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let captured = CommandOutput {
            command: rendered,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as u64,
            started_at,
        };

        debug!(
            command = %captured.command,
            exit_code = ?captured.exit_code,
            duration_ms = captured.duration_ms,
            "External command finished"
        );

        Ok(captured)
    }
}
