// Entry point for the xkdc-daily job runner.
//
// Resolves the project layout and settings, routes diagnostics into the dated
// parent log, runs the requested command's steps and exits with a code that
// summarizes them: 0 success, 1 a step failed or was canceled, 2 setup error.

use anyhow::{Context, Result};
use clap::Parser;
use daily_common::constants::{return_code, variables};
use daily_common::logging;
use daily_common::{job_result, JobHostContext, RunDate, TraceSetting};
use daily_sdk::trace::TracingTraceWriter;
use daily_sdk::{CommandRunner, ProcessInvoker, StringUtil};
use std::path::PathBuf;
use std::sync::Arc;

use daily_runner::checks;
use daily_runner::command_settings::{Args, Command};
use daily_runner::job_runner::JobRunner;

fn main() {
    let args = Args::parse();

    // Build the async runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    let exit_code = runtime.block_on(async move { run(args).await });

    std::process::exit(exit_code);
}

async fn run(args: Args) -> i32 {
    let command = args.command();

    let host_context = match setup(&args, &command) {
        Ok(host_context) => host_context,
        Err(e) => {
            // The subscriber may not be installed yet.
            eprintln!("daily-runner: {e:#}");
            tracing::error!("Setup failed: {:#}", e);
            return return_code::SETUP_ERROR;
        }
    };

    if command == Command::Check {
        return run_checks(&args, &host_context);
    }

    // Ctrl-C cancels the running child and every step after it.
    let signal_context = host_context.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_context.shutdown("Ctrl-C received");
        }
    });

    let outcomes = JobRunner::new(host_context).run_async(&command).await;
    job_result(&outcomes).to_return_code()
}

/// Everything that must succeed before the first step runs.
fn setup(args: &Args, command: &Command) -> Result<Arc<JobHostContext>> {
    let home = std::env::var_os(variables::HOME).map(PathBuf::from);
    let (layout, settings) = args.resolve(home.as_deref())?;
    if command.requires_base_dir() {
        layout.validate()?;
    }

    let run_date = RunDate::now();
    let parent_log = command
        .writes_parent_log()
        .then(|| layout.parent_log_path(&run_date));
    let parent_log = logging::init(parent_log.as_deref(), args.verbose)
        .context("Failed to initialize logging")?;

    let print_to_stdout = std::env::var(variables::PRINT_LOG_TO_STDOUT)
        .ok()
        .and_then(|value| StringUtil::convert_to_bool(&value))
        .unwrap_or(false);

    let invoker: Arc<dyn CommandRunner> =
        Arc::new(ProcessInvoker::new(Arc::new(TracingTraceWriter::new("process"))));

    tracing::debug!("Resolved base directory {}", layout.base().display());
    Ok(JobHostContext::new(settings, layout, run_date, invoker)
        .with_home(home)
        .with_trace_setting(TraceSetting { print_to_stdout })
        .with_parent_log(parent_log)
        .into_shared())
}

fn run_checks(args: &Args, host_context: &JobHostContext) -> i32 {
    let layout = host_context.layout();
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| layout.settings_path());
    let trace = host_context.get_trace("Check");

    let results = checks::run_all_checks(layout, &settings_path, &trace);
    print!("{}", checks::format_check_results(&results));

    if results.iter().all(|r| r.passed) {
        return_code::SUCCESS
    } else {
        return_code::STEP_FAILED
    }
}
