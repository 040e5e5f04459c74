// StepResult: outcome of one pipeline step, merging into a job result.

use crate::constants::return_code;
use std::fmt;
use std::time::Duration;

/// Ordered by severity: a merge keeps the greater value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StepResult {
    Succeeded,
    Skipped,
    Failed,
    Canceled,
}

impl StepResult {
    /// Merge two results, keeping the worst one.
    pub fn merge(current: Option<StepResult>, coming: StepResult) -> StepResult {
        match current {
            None => coming,
            Some(current) => current.max(coming),
        }
    }

    /// Whether the job as a whole should be considered healthy.
    pub fn is_success(&self) -> bool {
        matches!(self, StepResult::Succeeded | StepResult::Skipped)
    }

    /// Process exit code for a finished job with this merged result.
    pub fn to_return_code(self) -> i32 {
        if self.is_success() {
            return_code::SUCCESS
        } else {
            return_code::STEP_FAILED
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Succeeded => write!(f, "Succeeded"),
            StepResult::Skipped => write!(f, "Skipped"),
            StepResult::Failed => write!(f, "Failed"),
            StepResult::Canceled => write!(f, "Canceled"),
        }
    }
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,
    pub result: StepResult,
    pub elapsed: Duration,
    /// Failure or skip reason, if any.
    pub message: Option<String>,
}

impl StepOutcome {
    pub fn new(name: impl Into<String>, result: StepResult, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            result,
            elapsed,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {:<9} {:>8.2?}", self.name, self.result, self.elapsed)?;
        if let Some(ref message) = self.message {
            write!(f, "  {message}")?;
        }
        Ok(())
    }
}

/// Merge every outcome into one job result; an empty run succeeded.
pub fn job_result(outcomes: &[StepOutcome]) -> StepResult {
    outcomes
        .iter()
        .fold(None, |acc, o| Some(StepResult::merge(acc, o.result)))
        .unwrap_or(StepResult::Succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_worst() {
        assert_eq!(StepResult::merge(None, StepResult::Skipped), StepResult::Skipped);
        assert_eq!(
            StepResult::merge(Some(StepResult::Succeeded), StepResult::Failed),
            StepResult::Failed
        );
        assert_eq!(
            StepResult::merge(Some(StepResult::Failed), StepResult::Succeeded),
            StepResult::Failed
        );
        assert_eq!(
            StepResult::merge(Some(StepResult::Failed), StepResult::Canceled),
            StepResult::Canceled
        );
    }

    #[test]
    fn return_codes() {
        assert_eq!(StepResult::Succeeded.to_return_code(), 0);
        assert_eq!(StepResult::Skipped.to_return_code(), 0);
        assert_eq!(StepResult::Failed.to_return_code(), 1);
        assert_eq!(StepResult::Canceled.to_return_code(), 1);
    }

    #[test]
    fn job_result_of_outcomes() {
        assert_eq!(job_result(&[]), StepResult::Succeeded);
        let outcomes = vec![
            StepOutcome::new("sync", StepResult::Succeeded, Duration::ZERO),
            StepOutcome::new("scrape", StepResult::Failed, Duration::ZERO).with_message("exit 1"),
            StepOutcome::new("rotate", StepResult::Succeeded, Duration::ZERO),
        ];
        assert_eq!(job_result(&outcomes), StepResult::Failed);
    }

    #[test]
    fn outcome_display_includes_message() {
        let outcome = StepOutcome::new("publish", StepResult::Failed, Duration::from_millis(1500))
            .with_message("git push exited with 128");
        let text = outcome.to_string();
        assert!(text.starts_with("publish"));
        assert!(text.contains("Failed"));
        assert!(text.ends_with("git push exited with 128"));
    }
}
