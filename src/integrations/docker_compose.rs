//! # Docker Compose Service Control
//!
//! Stops and starts one Compose service. The image version is selected by
//! exporting the configured tag variable (default `IMAGE_TAG`) to `docker
//! compose`, which the compose file is expected to interpolate:
//!
//! ```yaml
//! services:
//!   app:
//!     image: registry.example.com/app:${IMAGE_TAG:-latest}
//! ```
//!
//! Both the `docker compose` plugin and the standalone `docker-compose`
//! binary are supported; the `compose` subcommand is only added for the former.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::run_checked;
use crate::config::ServiceTargetConfig;
use crate::error::ToolFailure;
use crate::execution::{CommandOutput, CommandRunner, CommandSpec};
use crate::orchestration::types::ServiceControl;

pub struct DockerComposeService {
    config: ServiceTargetConfig,
    runner: Arc<dyn CommandRunner>,
}

impl DockerComposeService {
    pub fn new(config: ServiceTargetConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// `docker compose -f <file> [-p <project>] <subcommand...>`
    pub fn compose_command<I, S>(&self, subcommand: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new(&self.config.docker_bin);
        if !self.is_standalone_binary() {
            spec = spec.arg("compose");
        }
        spec = spec
            .arg("-f")
            .arg(self.config.compose_file.to_string_lossy());
        if let Some(project) = &self.config.project_name {
            spec = spec.arg("-p").arg(project);
        }
        if let Some(dir) = &self.config.working_dir {
            spec = spec.current_dir(dir);
        }
        spec.args(subcommand)
    }

    fn is_standalone_binary(&self) -> bool {
        self.config.docker_bin.ends_with("docker-compose")
    }

    async fn is_running(&self) -> Result<bool, ToolFailure> {
        let spec = self.compose_command([
            "ps",
            "--status",
            "running",
            "-q",
            self.config.service_name.as_str(),
        ]);
        let output = run_checked(self.runner.as_ref(), &spec).await?;
        Ok(!output.stdout.trim().is_empty())
    }
}

#[async_trait]
impl ServiceControl for DockerComposeService {
    fn service_name(&self) -> &str {
        &self.config.service_name
    }

    fn current_version(&self) -> String {
        self.config.current_version.clone()
    }

    async fn stop(&self) -> Result<CommandOutput, ToolFailure> {
        let spec = self.compose_command(["stop", self.config.service_name.as_str()]);
        let output = run_checked(self.runner.as_ref(), &spec).await?;

        if self.is_running().await? {
            return Err(ToolFailure::Unconfirmed(format!(
                "`{}` exited 0 but {} is still running",
                output.command, self.config.service_name
            )));
        }
        debug!(service = %self.config.service_name, "Service confirmed stopped");
        Ok(output)
    }

    async fn start_at_version(&self, version: &str) -> Result<CommandOutput, ToolFailure> {
        let service = self.config.service_name.as_str();

        let pull = self
            .compose_command(["pull", service])
            .env(&self.config.image_tag_env, version);
        run_checked(self.runner.as_ref(), &pull).await?;

        let up = self
            .compose_command(["up", "-d", service])
            .env(&self.config.image_tag_env, version);
        run_checked(self.runner.as_ref(), &up).await
    }

    async fn resume(&self) -> Result<CommandOutput, ToolFailure> {
        // `start` reuses the stopped containers, so the running image is kept
        let spec = self.compose_command(["start", self.config.service_name.as_str()]);
        run_checked(self.runner.as_ref(), &spec).await
    }
}
