// Completion step: tell whoever watches the terminal that scraping is over.

use anyhow::Result;
use async_trait::async_trait;
use daily_common::constants;
use std::io::Write;

use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

pub struct CompletionStep;

#[async_trait]
impl Step for CompletionStep {
    fn name(&self) -> &str {
        "complete"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", constants::COMPLETION_MESSAGE)?;
        stdout.flush()?;
        context.debug("Completion message printed");
        Ok(())
    }
}
