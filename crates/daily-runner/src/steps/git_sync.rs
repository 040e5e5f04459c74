// Git sync step: point the checkout at the source remote and hard-sync it.

use anyhow::Result;
use async_trait::async_trait;
use daily_common::constants::tools;
use daily_common::WellKnownDirectory;
use daily_sdk::CommandSpec;

use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

pub struct GitSyncStep;

impl GitSyncStep {
    /// The three commands, in order, all run in the base directory.
    pub fn commands(context: &ExecutionContext) -> Vec<CommandSpec> {
        let host = context.host_context();
        let settings = host.settings();
        let base = host.directory(WellKnownDirectory::Base);
        let git = |args: &[&str]| {
            CommandSpec::new(tools::GIT)
                .args(args.iter().copied())
                .current_dir(&base)
        };

        vec![
            git(&["remote", "set-url", &settings.remote_name, &settings.remote_url]),
            git(&["reset", "--hard"]),
            git(&["pull", &settings.remote_name, &settings.branch]),
        ]
    }
}

#[async_trait]
impl Step for GitSyncStep {
    fn name(&self) -> &str {
        "sync"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        context.run_each(Self::commands(context)).await
    }
}
