// Scrape step: build the scraper image and run it with the project mounted.

use anyhow::Result;
use async_trait::async_trait;

use crate::container::{ContainerInfo, DockerCommandManager};
use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

pub struct ScrapeStep {
    docker: DockerCommandManager,
}

impl ScrapeStep {
    pub fn new() -> Self {
        Self::with_docker(DockerCommandManager::new())
    }

    pub fn with_docker(docker: DockerCommandManager) -> Self {
        Self { docker }
    }
}

impl Default for ScrapeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ScrapeStep {
    fn name(&self) -> &str {
        "scrape"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        let host = context.host_context();
        let container = ContainerInfo::for_job(host);

        // A failed build still runs the last good image.
        let build = self.docker.build_image(context, &container).await;
        if build.is_err() && context.is_cancelled() {
            return build;
        }
        if let Err(ref e) = build {
            context.warning(&format!("{e:#}"));
        }

        let stdout_log = host.output_log_path();
        let stderr_log = host.error_log_path();
        let exit_code = self
            .docker
            .run_container(context, &container, &stdout_log, &stderr_log)
            .await?;
        if exit_code != 0 {
            anyhow::bail!(
                "Container '{}' exited with code {}; see {}",
                container.image,
                exit_code,
                stderr_log.display()
            );
        }
        context.info(&format!("Container output appended to {}", stdout_log.display()));
        build
    }
}
