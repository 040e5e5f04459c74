// daily-runner: the xkdc-daily job and its command-line front end.
// Depends on `daily-sdk` and `daily-common`.
//
// Architecture:
//   main → Args::resolve → JobRunner::run_async → StepsRunner::run_async
//     → per-step Step::run → ExecutionContext::run_command → CommandRunner

pub mod checks;
pub mod command_settings;
pub mod container;
pub mod execution_context;
pub mod job_runner;
pub mod steps;
pub mod steps_runner;

#[cfg(test)]
mod test_support;
