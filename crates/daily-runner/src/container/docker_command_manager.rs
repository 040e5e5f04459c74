// DockerCommandManager: docker CLI invocations for building and running the
// scraper image.

use anyhow::{Context, Result};
use daily_common::constants::tools;
use daily_sdk::{CommandSpec, OutputTarget};
use std::path::Path;

use crate::container::container_info::ContainerInfo;
use crate::execution_context::ExecutionContext;

/// Manages Docker CLI operations.
pub struct DockerCommandManager {
    docker_path: String,
}

impl DockerCommandManager {
    pub fn new() -> Self {
        Self {
            docker_path: tools::DOCKER.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Command construction
    // -----------------------------------------------------------------------

    /// `docker build -t <image> <context>`
    pub fn build_command(&self, container: &ContainerInfo) -> CommandSpec {
        CommandSpec::new(&self.docker_path)
            .args(["build", "-t", container.image.as_str()])
            .arg(container.build_context.to_string_lossy())
            .current_dir(&container.build_context)
    }

    /// `docker run [--rm] -v ... <image>`
    pub fn run_command(&self, container: &ContainerInfo) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.docker_path).arg("run");
        if container.remove_on_exit {
            spec = spec.arg("--rm");
        }
        spec.args(container.build_volume_args())
            .arg(container.image.as_str())
    }

    // -----------------------------------------------------------------------
    // Image and container operations
    // -----------------------------------------------------------------------

    /// Build the image; output goes to the job's own log.
    pub async fn build_image(
        &self,
        context: &ExecutionContext,
        container: &ContainerInfo,
    ) -> Result<()> {
        context
            .run_checked(self.build_command(container))
            .await
            .with_context(|| format!("Failed to build image '{}'", container.image))?;
        Ok(())
    }

    /// Run the container to completion and return its exit code.
    ///
    /// The container's stdout is appended to `stdout_log` and its stderr to
    /// `stderr_log`.
    pub async fn run_container(
        &self,
        context: &ExecutionContext,
        container: &ContainerInfo,
        stdout_log: &Path,
        stderr_log: &Path,
    ) -> Result<i32> {
        let spec = self
            .run_command(container)
            .stdout(OutputTarget::AppendFile(stdout_log.to_path_buf()))
            .stderr(OutputTarget::AppendFile(stderr_log.to_path_buf()));
        let output = context
            .run_command(spec)
            .await
            .with_context(|| format!("Failed to run container '{}'", container.image))?;
        Ok(output.exit_code)
    }
}

impl Default for DockerCommandManager {
    fn default() -> Self {
        Self::new()
    }
}
