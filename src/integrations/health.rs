//! Health probes: an HTTP GET that passes on any 2xx, or an external
//! health-check command that passes on exit code 0.

use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::HealthEndpointConfig;
use crate::error::{Result, RollbackError};
use crate::execution::{CommandRunner, CommandSpec};
use crate::orchestration::types::{HealthProbe, ProbeError};

/// Build the probe the configuration asks for; a command wins over the URL
pub fn probe_from_config(
    config: &HealthEndpointConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<Arc<dyn HealthProbe>> {
    match &config.command {
        Some(command) => {
            let (program, args) = command.split_first().ok_or_else(|| {
                RollbackError::Configuration("health.command must name a program".to_string())
            })?;
            let spec = CommandSpec::new(program).args(args.iter().cloned());
            Ok(Arc::new(CommandHealthProbe::new(
                spec,
                runner,
                config.timeout(),
            )))
        }
        None => Ok(Arc::new(HttpHealthProbe::new(&config.url, config.timeout())?)),
    }
}

#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: Client,
    url: Url,
}

impl HttpHealthProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| {
            RollbackError::Configuration(format!("Invalid health URL '{url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("rollback/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RollbackError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    fn target(&self) -> String {
        self.url.to_string()
    }

    async fn probe(&self) -> std::result::Result<(), ProbeError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| ProbeError(format!("Health check request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %self.url, status = %status, "Health check passed");
            Ok(())
        } else {
            Err(ProbeError(format!("Health check failed with status: {status}")))
        }
    }
}

/// Runs a health-check command; a run longer than `timeout` counts as a failed probe
pub struct CommandHealthProbe {
    command: CommandSpec,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl CommandHealthProbe {
    pub fn new(command: CommandSpec, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            command,
            runner,
            timeout,
        }
    }
}

#[async_trait]
impl HealthProbe for CommandHealthProbe {
    fn target(&self) -> String {
        self.command.display()
    }

    async fn probe(&self) -> std::result::Result<(), ProbeError> {
        let output = tokio::time::timeout(self.timeout, self.runner.run(&self.command))
            .await
            .map_err(|_| {
                ProbeError(format!(
                    "`{}` did not finish within {}ms",
                    self.command.display(),
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| ProbeError(e.to_string()))?;
        if output.success() {
            Ok(())
        } else {
            Err(ProbeError(format!(
                "`{}` exited with {}: {}",
                output.command,
                output.exit_status(),
                output.diagnostics()
            )))
        }
    }
}
