// Publish step: commit and push the archive, log and data repositories.
// Each directory is an independent transaction and every command in it is
// attempted.

use anyhow::Result;
use async_trait::async_trait;
use daily_common::constants::{tools, variables};
use daily_common::WellKnownDirectory;
use daily_sdk::{CommandSpec, OutputTarget};
use std::path::Path;

use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

/// `git commit` output when the index matches HEAD, in the C locale.
const NOTHING_TO_COMMIT: &[&str] = &["nothing to commit", "nothing added to commit"];

pub struct PublishStep;

impl PublishStep {
    fn git(directory: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new(tools::GIT)
            .args(args.iter().copied())
            .current_dir(directory)
    }

    /// Commit whatever is staged. An empty commit is not a failure: the push
    /// after it may still have earlier commits to send.
    async fn commit(context: &ExecutionContext, directory: &Path, message: &str) -> Result<()> {
        let spec = Self::git(directory, &["commit", "-m", message])
            .env(variables::LC_ALL, "C")
            .stdout(OutputTarget::Capture);
        let display = spec.clone();
        let output = context.run_command(spec).await?;
        for line in &output.stdout {
            context.info(&format!("git: {line}"));
        }

        if output.success() {
            return Ok(());
        }
        let nothing_to_commit = output
            .stdout
            .iter()
            .any(|line| NOTHING_TO_COMMIT.iter().any(|needle| line.contains(needle)));
        if nothing_to_commit {
            context.info(&format!("Nothing to commit in {}", directory.display()));
            return Ok(());
        }
        output.check(&display)?;
        Ok(())
    }

    /// `git add -A`, `git commit`, `git push` in one directory.
    async fn publish_directory(
        context: &ExecutionContext,
        directory: WellKnownDirectory,
    ) -> Result<()> {
        let host = context.host_context();
        let path = host.directory(directory);
        let message = host.commit_message(directory);
        let mut failures = Vec::new();

        if let Err(e) = context.run_checked(Self::git(&path, &["add", "-A"])).await {
            failures.push(e);
        }
        if !context.is_cancelled() {
            if let Err(e) = Self::commit(context, &path, &message).await {
                failures.push(e);
            }
        }
        if !context.is_cancelled() {
            if let Err(e) = context.run_checked(Self::git(&path, &["push"])).await {
                failures.push(e);
            }
        }

        for failure in &failures {
            context.warning(&format!("{directory}: {failure:#}"));
        }
        match failures.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Step for PublishStep {
    fn name(&self) -> &str {
        "publish"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        let mut failed = Vec::new();
        for directory in WellKnownDirectory::PUBLISHED {
            if context.is_cancelled() {
                anyhow::bail!("Publishing was cancelled before '{directory}'");
            }
            match Self::publish_directory(context, directory).await {
                Ok(()) => context.info(&format!("Published {directory}")),
                Err(_) => failed.push(directory.to_string()),
            }
        }

        if !failed.is_empty() {
            anyhow::bail!("Publishing failed for: {}", failed.join(", "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestHost;

    #[tokio::test]
    async fn publishes_archive_log_data_in_order() {
        let host = TestHost::new();
        let context = host.execution_context("publish");

        PublishStep.run(&context).await.unwrap();

        let invocations = host.runner.invocations();
        assert_eq!(invocations.len(), 9);
        let dirs: Vec<_> = invocations
            .iter()
            .map(|spec| spec.working_directory.clone().unwrap())
            .collect();
        for (i, name) in ["archive", "log", "data"].iter().enumerate() {
            for spec_dir in &dirs[i * 3..i * 3 + 3] {
                assert_eq!(spec_dir, &host.base.join(name));
            }
        }
        assert_eq!(
            host.runner.command_lines()[..3],
            [
                "git add -A".to_string(),
                "git commit -m \"Daily update 2024-01-01 06:00:00\"".to_string(),
                "git push".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_push_does_not_stop_other_directories() {
        let host = TestHost::new();
        // Every push fails; each directory still gets all three commands.
        host.runner.fail("git push", 128);
        let context = host.execution_context("publish");

        let err = PublishStep.run(&context).await.unwrap_err();

        assert_eq!(host.runner.command_lines().len(), 9);
        assert_eq!(
            err.to_string(),
            "Publishing failed for: archive, log, data"
        );
    }

    #[tokio::test]
    async fn nothing_to_commit_still_pushes() {
        let host = TestHost::new();
        host.runner.respond(
            "git commit",
            1,
            &["On branch main", "nothing to commit, working tree clean"],
        );
        let context = host.execution_context("publish");

        PublishStep.run(&context).await.unwrap();

        let lines = host.runner.command_lines();
        assert_eq!(lines.iter().filter(|l| *l == "git push").count(), 3);
        let commit = &host.runner.invocations()[1];
        assert_eq!(commit.environment["LC_ALL"], "C");
    }

    #[tokio::test]
    async fn real_commit_failure_is_reported() {
        let host = TestHost::new();
        host.runner.respond("git commit", 128, &["fatal: unable to auto-detect email address"]);
        let context = host.execution_context("publish");

        let err = PublishStep.run(&context).await.unwrap_err();
        assert!(err.to_string().contains("archive"));
        assert_eq!(host.runner.command_lines().len(), 9);
    }
}
