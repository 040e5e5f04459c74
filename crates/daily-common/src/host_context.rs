// JobHostContext: the application context handed to every step.
// Holds settings, resolved layout, run clock, the command runner, tracing and
// the shutdown token.

use crate::config_store::JobSettings;
use crate::constants::WellKnownDirectory;
use crate::layout::JobLayout;
use crate::logging::ParentLog;
use crate::run_date::RunDate;
use crate::trace_manager::{TraceManager, TraceSetting, Tracing};

use anyhow::Result;
use daily_sdk::{CommandRunner, StringUtil, TraceWriter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a step needs to know about the current run.
pub struct JobHostContext {
    settings: JobSettings,
    layout: JobLayout,
    run_date: RunDate,
    home: Option<PathBuf>,

    command_runner: Arc<dyn CommandRunner>,
    trace_manager: TraceManager,
    parent_log: Option<ParentLog>,

    /// Cancelled on Ctrl-C; every child process watches it.
    shutdown_token: CancellationToken,

    /// Variables exported to every child started after they were set
    /// (the SSH agent socket, mostly).
    process_environment: Mutex<HashMap<String, String>>,
}

impl JobHostContext {
    pub fn new(
        settings: JobSettings,
        layout: JobLayout,
        run_date: RunDate,
        command_runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            settings,
            layout,
            run_date,
            home: None,
            command_runner,
            trace_manager: TraceManager::default(),
            parent_log: None,
            shutdown_token: CancellationToken::new(),
            process_environment: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn with_trace_setting(mut self, setting: TraceSetting) -> Self {
        self.trace_manager = TraceManager::with_setting(setting);
        self
    }

    pub fn with_parent_log(mut self, parent_log: Option<ParentLog>) -> Self {
        self.parent_log = parent_log;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    pub fn layout(&self) -> &JobLayout {
        &self.layout
    }

    pub fn run_date(&self) -> &RunDate {
        &self.run_date
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn directory(&self, directory: WellKnownDirectory) -> PathBuf {
        self.layout.directory(directory)
    }

    pub fn command_runner(&self) -> Arc<dyn CommandRunner> {
        self.command_runner.clone()
    }

    /// Get a trace source for the given component name.
    pub fn get_trace(&self, name: &str) -> Tracing {
        self.trace_manager.get(name)
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    pub fn ssh_key_path(&self) -> PathBuf {
        self.settings.ssh_key_path(self.home())
    }

    pub fn parent_log_path(&self) -> PathBuf {
        self.layout.parent_log_path(&self.run_date)
    }

    /// Point the live parent log at `path` if it is currently writing to
    /// `rotated_from`. No-op when the run has no parent log.
    pub fn follow_parent_log(&self, rotated_from: &Path, path: &Path) -> Result<()> {
        match self.parent_log {
            Some(ref log) if log.path() == rotated_from => log.reopen(path),
            _ => Ok(()),
        }
    }

    pub fn output_log_path(&self) -> PathBuf {
        self.layout.output_log_path(&self.run_date)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.layout.error_log_path(&self.run_date)
    }

    /// Commit message for publishing `directory`.
    pub fn commit_message(&self, directory: WellKnownDirectory) -> String {
        let timestamp = self.run_date.timestamp_string();
        let name = directory.to_string();
        StringUtil::expand_placeholders(
            &self.settings.commit_message_template,
            &[("timestamp", timestamp.as_str()), ("directory", name.as_str())],
        )
    }

    // -----------------------------------------------------------------------
    // Child process environment
    // -----------------------------------------------------------------------

    pub fn set_process_env(&self, key: impl Into<String>, value: impl Into<String>) {
        self.process_environment.lock().insert(key.into(), value.into());
    }

    pub fn process_environment(&self) -> HashMap<String, String> {
        self.process_environment.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Cancel the run; the running child is signalled and later steps are not started.
    pub fn shutdown(&self, reason: &str) {
        self.get_trace("HostContext")
            .warning(&format!("Job will be cancelled: {reason}"));
        self.shutdown_token.cancel();
    }
}
