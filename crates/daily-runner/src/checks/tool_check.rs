// External tool availability: git, docker, ssh-agent, ssh-add.

use super::check_extension::CheckResult;
use daily_sdk::WhichUtil;

pub struct ToolCheck;

impl ToolCheck {
    /// Check that `tool` resolves on PATH.
    pub fn run_check(tool: &str) -> CheckResult {
        let description = format!("Check if {tool} is installed and on the PATH");
        match WhichUtil::which(tool, true) {
            Ok(Some(path)) => {
                CheckResult::pass(tool, description).with_detail(path.display().to_string())
            }
            Ok(None) => CheckResult::fail(tool, description, format!("{tool}: command not found")),
            Err(e) => CheckResult::fail(tool, description, e.to_string()),
        }
    }
}
