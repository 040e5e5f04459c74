// JobRunner: turns a command into its list of steps, runs them and reports
// the outcome of each.

use daily_common::{job_result, JobHostContext, StepOutcome, StepResult};
use daily_sdk::{JobPackage, Source, TraceWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::command_settings::Command;
use crate::execution_context::ExecutionContext;
use crate::steps::ssh_agent::stop_started_agent;
use crate::steps::{
    ArchivalStep, CompletionStep, GitSyncStep, PublishStep, RotationStep, ScrapeStep, SshAgentStep,
};
use crate::steps_runner::{Step, StepsRunner};

/// Orchestrates a single job execution.
pub struct JobRunner {
    host_context: Arc<JobHostContext>,
}

impl JobRunner {
    pub fn new(host_context: Arc<JobHostContext>) -> Self {
        Self { host_context }
    }

    /// The steps `command` runs, in order. `check` has none.
    pub fn build_steps(command: &Command) -> Vec<Box<dyn Step>> {
        match command {
            Command::Run => vec![
                Box::new(SshAgentStep::new()),
                Box::new(GitSyncStep),
                Box::new(ScrapeStep::new()),
                Box::new(CompletionStep),
                Box::new(RotationStep::new(false)),
                Box::new(ArchivalStep::new(false)),
                Box::new(PublishStep),
            ],
            Command::Sync => vec![Box::new(SshAgentStep::new()), Box::new(GitSyncStep)],
            Command::Scrape => vec![Box::new(ScrapeStep::new())],
            Command::Rotate { dry_run } => vec![Box::new(RotationStep::new(*dry_run))],
            Command::Archive { dry_run } => vec![Box::new(ArchivalStep::new(*dry_run))],
            Command::Publish => vec![Box::new(SshAgentStep::new()), Box::new(PublishStep)],
            Command::Check => Vec::new(),
        }
    }

    /// Run `steps` to completion and log a summary line per step.
    pub async fn run_steps(&self, command: &Command, steps: &[Box<dyn Step>]) -> Vec<StepOutcome> {
        let trace = self.host_context.get_trace("JobRunner");
        trace.info(&format!(
            "{} {} ({}) starting '{}' in {} for {}",
            env!("CARGO_PKG_NAME"),
            JobPackage::VERSION,
            Source::COMMIT_HASH,
            command,
            self.host_context.layout().base().display(),
            self.host_context.run_date().date_string()
        ));

        let outcomes = StepsRunner::new(self.host_context.clone())
            .run_async(steps)
            .await;

        // Runs even after Ctrl-C, so it gets its own token.
        let cleanup = ExecutionContext::new(
            self.host_context.clone(),
            "ssh",
            CancellationToken::new(),
        );
        if let Err(e) = stop_started_agent(&cleanup).await {
            trace.warning(&format!("{e:#}"));
        }

        let result = job_result(&outcomes);
        trace.info("Step summary:");
        for outcome in &outcomes {
            match outcome.result {
                StepResult::Succeeded | StepResult::Skipped => trace.info(&format!("  {outcome}")),
                StepResult::Failed | StepResult::Canceled => trace.warning(&format!("  {outcome}")),
            }
        }
        trace.info(&format!(
            "Job '{}' finished: {} (exit code {})",
            command,
            result,
            result.to_return_code()
        ));

        outcomes
    }

    /// Run a command's steps.
    pub async fn run_async(&self, command: &Command) -> Vec<StepOutcome> {
        let steps = Self::build_steps(command);
        self.run_steps(command, &steps).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{run_date_at, TestHost};
    use daily_common::{AgeSignal, JobSettings};
    use std::fs;
    use std::time::SystemTime;

    fn names(command: &Command) -> Vec<String> {
        JobRunner::build_steps(command)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    #[test]
    fn commands_map_to_steps() {
        assert_eq!(
            names(&Command::Run),
            vec!["ssh", "sync", "scrape", "complete", "rotate", "archive", "publish"]
        );
        assert_eq!(names(&Command::Sync), vec!["ssh", "sync"]);
        assert_eq!(names(&Command::Publish), vec!["ssh", "publish"]);
        assert_eq!(names(&Command::Rotate { dry_run: true }), vec!["rotate"]);
        assert!(names(&Command::Check).is_empty());
    }

    /// The full pipeline against a recording runner, using the layout from the
    /// classic example: a parent log and a 42-day-old dated directory.
    #[tokio::test]
    async fn full_pipeline_rotates_archives_and_publishes() {
        let settings = JobSettings {
            age_signal: AgeSignal::DirectoryName,
            ..JobSettings::default()
        };
        let host = TestHost::with(settings, run_date_at(SystemTime::now()));
        host.runner.respond(
            "ssh-agent -s",
            0,
            &[
                "SSH_AUTH_SOCK=/tmp/ssh-x/agent.1; export SSH_AUTH_SOCK;",
                "SSH_AGENT_PID=2; export SSH_AGENT_PID;",
            ],
        );
        host.runner.respond("docker run", 0, &["scraped"]);
        host.write("log/logfile_parent_2024-01-01.log", "parent\n");
        host.write("log/2023-11-20/logfile_2023-11-20.log", "old\n");

        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(SshAgentStep::with_inherited_socket(None)),
            Box::new(GitSyncStep),
            Box::new(ScrapeStep::new()),
            Box::new(CompletionStep),
            Box::new(RotationStep::new(false)),
            Box::new(ArchivalStep::new(false)),
            Box::new(PublishStep),
        ];
        let outcomes = JobRunner::new(host.context.clone())
            .run_steps(&Command::Run, &steps)
            .await;

        assert_eq!(job_result(&outcomes), StepResult::Succeeded);
        assert_eq!(outcomes.len(), 7);

        let log = host.base.join("log");
        assert!(log.join("2024-01-01/logfile_parent_2024-01-01.log").is_file());
        assert_eq!(
            fs::read_to_string(log.join("2024-01-01/logfile_2024-01-01.log")).unwrap(),
            "scraped\n"
        );
        assert!(log.join("2024-01-01/errfile_2024-01-01.log").is_file());
        assert!(!log.join("logfile_parent_2024-01-01.log").exists());
        assert!(host.base.join("archive/2023-11-20/logfile_2023-11-20.log").is_file());
        assert!(!log.join("2023-11-20").exists());

        // ssh-agent, ssh-add, 3 git sync, 2 docker, 9 publish, agent stop
        let lines = host.runner.command_lines();
        assert_eq!(lines.len(), 17);
        assert_eq!(lines[15], "git push");
        assert_eq!(lines.last().unwrap(), "ssh-agent -k");
    }

    #[tokio::test]
    async fn container_failure_does_not_stop_rotation_or_publish() {
        let host = TestHost::new();
        host.runner.respond(
            "ssh-agent -s",
            0,
            &[
                "SSH_AUTH_SOCK=/tmp/ssh-x/agent.1; export SSH_AUTH_SOCK;",
                "SSH_AGENT_PID=2; export SSH_AGENT_PID;",
            ],
        );
        host.runner.fail("docker run", 1);

        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(SshAgentStep::with_inherited_socket(None)),
            Box::new(ScrapeStep::new()),
            Box::new(RotationStep::new(false)),
            Box::new(PublishStep),
        ];
        let outcomes = JobRunner::new(host.context.clone())
            .run_steps(&Command::Run, &steps)
            .await;

        let results: Vec<_> = outcomes.iter().map(|o| o.result).collect();
        assert_eq!(
            results,
            vec![
                StepResult::Succeeded,
                StepResult::Failed,
                StepResult::Succeeded,
                StepResult::Succeeded
            ]
        );
        assert_eq!(job_result(&outcomes).to_return_code(), 1);
        assert_eq!(host.runner.command_lines().last().unwrap(), "ssh-agent -k");
        assert!(host
            .base
            .join("log/2024-01-01/errfile_2024-01-01.log")
            .is_file());
    }
}
