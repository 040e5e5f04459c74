// StepsRunner: runs the job's steps in order and records every outcome.
// A step failure is a value, not an abort; Ctrl-C marks the rest Canceled
// and fail-fast mode marks the rest Skipped.

use anyhow::Result;
use async_trait::async_trait;
use daily_common::{JobHostContext, StepOutcome, StepResult};
use daily_sdk::TraceWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::execution_context::ExecutionContext;

/// One unit of the daily pipeline.
#[async_trait]
pub trait Step: Send + Sync {
    /// Short name used in logs and the run summary.
    fn name(&self) -> &str;

    /// Run the step. An `Err` marks the step Failed (or Canceled when the
    /// run is shutting down); the pipeline moves on either way.
    async fn run(&self, context: &ExecutionContext) -> Result<()>;
}

/// Executes all steps of a job, in order.
pub struct StepsRunner {
    host_context: Arc<JobHostContext>,
}

impl StepsRunner {
    pub fn new(host_context: Arc<JobHostContext>) -> Self {
        Self { host_context }
    }

    pub async fn run_async(&self, steps: &[Box<dyn Step>]) -> Vec<StepOutcome> {
        let trace = self.host_context.get_trace("StepsRunner");
        let settings = self.host_context.settings();
        let timeout = settings.step_timeout();
        let mut outcomes = Vec::with_capacity(steps.len());
        let mut stop_reason: Option<String> = None;

        for step in steps {
            if self.host_context.is_shutting_down() {
                trace.info(&format!("Skipping step '{}' due to job cancellation.", step.name()));
                outcomes.push(
                    StepOutcome::new(step.name(), StepResult::Canceled, Duration::ZERO)
                        .with_message("job was cancelled"),
                );
                continue;
            }

            if let Some(ref reason) = stop_reason {
                trace.info(&format!("Skipping step '{}': {}", step.name(), reason));
                outcomes.push(
                    StepOutcome::new(step.name(), StepResult::Skipped, Duration::ZERO)
                        .with_message(reason.clone()),
                );
                continue;
            }

            trace.info(&format!("Starting step: {}", step.name()));
            let outcome = self.run_step(step.as_ref(), timeout).await;
            trace.info(&format!(
                "Finished step: {} ({} in {:.2?})",
                outcome.name, outcome.result, outcome.elapsed
            ));

            if outcome.result == StepResult::Failed && !settings.continue_on_error {
                stop_reason = Some(format!("step '{}' failed", outcome.name));
            }
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn run_step(&self, step: &dyn Step, timeout: Option<Duration>) -> StepOutcome {
        let cancel = self.host_context.shutdown_token().child_token();
        let context = ExecutionContext::new(self.host_context.clone(), step.name(), cancel.clone());

        // The timer cancels the step's token so the running child is stopped
        // through the same signal escalation as Ctrl-C.
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = timeout.map(|limit| {
            let cancel = cancel.clone();
            let timed_out = timed_out.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                timed_out.store(true, Ordering::SeqCst);
                cancel.cancel();
            })
        });

        let started = Instant::now();
        let result = step.run(&context).await;
        let elapsed = started.elapsed();

        if let Some(timer) = timer {
            timer.abort();
        }

        match result {
            Ok(()) if timed_out.load(Ordering::SeqCst) => {
                StepOutcome::new(step.name(), StepResult::Failed, elapsed)
                    .with_message(Self::timeout_message(timeout))
            }
            Ok(()) => StepOutcome::new(step.name(), StepResult::Succeeded, elapsed),
            Err(_) if self.host_context.is_shutting_down() => {
                context.warning("Step was cancelled.");
                StepOutcome::new(step.name(), StepResult::Canceled, elapsed)
                    .with_message("job was cancelled")
            }
            Err(_) if timed_out.load(Ordering::SeqCst) => {
                let message = Self::timeout_message(timeout);
                context.error(&message);
                StepOutcome::new(step.name(), StepResult::Failed, elapsed).with_message(message)
            }
            Err(e) => {
                context.error(&format!("Step failed: {e:#}"));
                StepOutcome::new(step.name(), StepResult::Failed, elapsed)
                    .with_message(format!("{e:#}"))
            }
        }
    }

    fn timeout_message(timeout: Option<Duration>) -> String {
        match timeout {
            Some(limit) => format!("timed out after {:?}", limit),
            None => "timed out".to_string(),
        }
    }
}
