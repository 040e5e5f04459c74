// Fixtures shared by the step tests: a temporary project tree wired to a
// recording command runner.

use crate::execution_context::ExecutionContext;
use chrono::NaiveDate;
use daily_common::logging::ParentLog;
use daily_common::{JobHostContext, JobLayout, JobSettings, RunDate, WellKnownDirectory};
use daily_sdk::{CommandRunner, RecordingCommandRunner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// 2024-01-01 06:00:00 local, with filesystem ages measured from `system_time`.
pub fn run_date_at(system_time: SystemTime) -> RunDate {
    let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap();
    RunDate::fixed(timestamp, system_time)
}

/// A run clock `days` (plus an hour) in the future, so that everything on
/// disk looks that many whole days old.
pub fn run_date_days_ahead(days: u64) -> RunDate {
    run_date_at(SystemTime::now() + Duration::from_secs(days * 86_400 + 3_600))
}

pub struct TestHost {
    _dir: TempDir,
    pub base: PathBuf,
    pub context: Arc<JobHostContext>,
    pub runner: Arc<RecordingCommandRunner>,
    pub parent_log: Option<ParentLog>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with(JobSettings::default(), run_date_at(SystemTime::now()))
    }

    pub fn with(settings: JobSettings, run_date: RunDate) -> Self {
        Self::build(settings, run_date, false)
    }

    /// A host whose dated parent log is open, as in a real run.
    pub fn with_parent_log() -> Self {
        Self::build(JobSettings::default(), run_date_at(SystemTime::now()), true)
    }

    fn build(settings: JobSettings, run_date: RunDate, open_parent_log: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("xkdc-daily");
        for directory in WellKnownDirectory::MOUNTED {
            fs::create_dir_all(base.join(directory.dir_name().unwrap())).unwrap();
        }

        let layout = JobLayout::new(&base);
        let parent_log = open_parent_log
            .then(|| ParentLog::open(&layout.parent_log_path(&run_date)).unwrap());

        let runner = Arc::new(RecordingCommandRunner::new());
        let context = JobHostContext::new(
            settings,
            layout,
            run_date,
            runner.clone() as Arc<dyn CommandRunner>,
        )
        .with_home(Some(dir.path().to_path_buf()))
        .with_parent_log(parent_log.clone())
        .into_shared();

        Self {
            _dir: dir,
            base,
            context,
            runner,
            parent_log,
        }
    }

    pub fn execution_context(&self, step_name: &str) -> ExecutionContext {
        ExecutionContext::new(
            self.context.clone(),
            step_name,
            self.context.shutdown_token().child_token(),
        )
    }

    pub fn dir(&self, directory: WellKnownDirectory) -> PathBuf {
        self.context.directory(directory)
    }

    pub fn write(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.base.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }
}
