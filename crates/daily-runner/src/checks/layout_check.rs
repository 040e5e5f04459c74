// Project layout: the base directory, its four working directories and the
// optional settings file.

use super::check_extension::CheckResult;
use daily_common::{ConfigurationStore, JobLayout, WellKnownDirectory};
use std::path::Path;

pub struct LayoutCheck;

impl LayoutCheck {
    pub fn run_checks(layout: &JobLayout, settings_path: &Path) -> Vec<CheckResult> {
        let mut results = Vec::new();

        results.push(Self::directory_check(
            "base",
            layout.directory(WellKnownDirectory::Base).as_path(),
        ));
        for directory in WellKnownDirectory::MOUNTED {
            results.push(Self::directory_check(
                &directory.to_string(),
                layout.directory(directory).as_path(),
            ));
        }

        results.push(Self::settings_check(settings_path));
        results
    }

    fn directory_check(name: &str, path: &Path) -> CheckResult {
        let description = format!("Check that {} exists", path.display());
        if path.is_dir() {
            CheckResult::pass(name, description)
        } else {
            CheckResult::fail(name, description, "directory not found")
        }
    }

    fn settings_check(path: &Path) -> CheckResult {
        let description = format!("Check that {} is valid if present", path.display());
        let store = ConfigurationStore::new(path);
        if !store.is_configured() {
            return CheckResult::pass("settings", description).with_detail("not present, using defaults");
        }
        match store.load_settings() {
            Ok(_) => CheckResult::pass("settings", description),
            Err(e) => CheckResult::fail("settings", description, format!("{e:#}")),
        }
    }
}
