// ExecutionContext: what a single step sees while it runs.
// Wraps the shared host context with the step's name, its trace source and
// its cancellation token, and runs external commands on the step's behalf.

use anyhow::Result;
use daily_common::{JobHostContext, Tracing};
use daily_sdk::{CommandOutput, CommandSpec, TraceWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct ExecutionContext {
    host_context: Arc<JobHostContext>,
    step_name: String,
    trace: Tracing,
    cancel_token: CancellationToken,
}

impl ExecutionContext {
    /// Create the context for one step. `cancel_token` is a child of the
    /// host's shutdown token, so Ctrl-C and the step timeout both reach it.
    pub fn new(
        host_context: Arc<JobHostContext>,
        step_name: impl Into<String>,
        cancel_token: CancellationToken,
    ) -> Self {
        let step_name = step_name.into();
        let trace = host_context.get_trace(&step_name);
        Self {
            host_context,
            step_name,
            trace,
            cancel_token,
        }
    }

    pub fn host_context(&self) -> &Arc<JobHostContext> {
        &self.host_context
    }

    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------

    pub fn info(&self, message: &str) {
        self.trace.info(message);
    }

    pub fn debug(&self, message: &str) {
        self.trace.verbose(message);
    }

    pub fn warning(&self, message: &str) {
        self.trace.warning(message);
    }

    pub fn error(&self, message: &str) {
        self.trace.error(message);
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run a command and return its output whatever the exit code.
    ///
    /// Variables exported earlier in the run (the SSH agent socket) are added
    /// to the child's environment; variables set on `spec` take precedence.
    pub async fn run_command(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let mut environment = self.host_context.process_environment();
        environment.extend(spec.environment.clone());
        let spec = CommandSpec {
            environment,
            ..spec
        };

        self.info(&format!("Running: {spec}"));
        let output = self
            .host_context
            .command_runner()
            .run(spec, self.cancel_token())
            .await?;
        self.debug(&format!(
            "Exited with code {} after {:.2?}",
            output.exit_code, output.elapsed
        ));
        Ok(output)
    }

    /// Run a command and fail with a `ProcessExitCodeError` on non-zero exit.
    pub async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let display = spec.clone();
        let output = self.run_command(spec).await?;
        output.check(&display)?;
        Ok(output)
    }

    /// Run every command in order even when an earlier one fails.
    ///
    /// Fails with a summary when any command failed. Cancellation stops the
    /// sequence immediately.
    pub async fn run_each(&self, specs: Vec<CommandSpec>) -> Result<()> {
        let total = specs.len();
        let mut failures = Vec::new();
        for spec in specs {
            if let Err(e) = self.run_checked(spec).await {
                if self.is_cancelled() {
                    return Err(e);
                }
                self.warning(&format!("{e:#}"));
                failures.push(format!("{e:#}"));
            }
        }
        if !failures.is_empty() {
            anyhow::bail!(
                "{} of {} commands failed: {}",
                failures.len(),
                total,
                failures.join("; ")
            );
        }
        Ok(())
    }
}
