// Checks module - environment diagnostics for `daily-runner check`.

pub mod check_extension;
pub mod layout_check;
pub mod tool_check;

pub use check_extension::CheckResult;

use daily_common::constants::tools;
use daily_common::{JobLayout, Tracing};
use daily_sdk::TraceWriter;
use std::path::Path;

/// Run every check: tools first, then the project layout.
pub fn run_all_checks(layout: &JobLayout, settings_path: &Path, trace: &Tracing) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for tool in tools::ALL {
        trace.verbose(&format!("Running {tool} check..."));
        results.push(tool_check::ToolCheck::run_check(tool));
    }

    trace.verbose(&format!("Checking layout under {}...", layout.base().display()));
    results.extend(layout_check::LayoutCheck::run_checks(layout, settings_path));

    results
}

/// Format check results for display, one line per check.
pub fn format_check_results(results: &[CheckResult]) -> String {
    let mut output = String::new();

    for result in results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        output.push_str(&format!("[{}] {:<10} {}", status, result.name, result.description));
        if let Some(ref detail) = result.detail {
            output.push_str(&format!(" ({detail})"));
        }
        output.push('\n');
    }

    let fail_count = results.iter().filter(|r| !r.passed).count();
    output.push_str(&format!(
        "{} passed, {} failed\n",
        results.len() - fail_count,
        fail_count
    ));

    output
}
