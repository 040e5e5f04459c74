// JobLayout: the resolved project directories.

use crate::constants::{self, WellKnownDirectory};
use crate::error::JobError;
use crate::run_date::RunDate;
use std::path::{Path, PathBuf};

/// Paths of the project checkout: `<base>/{src,data,archive,log}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    base: PathBuf,
}

impl JobLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the base path.
    ///
    /// An explicit `base_override` wins; otherwise the base is
    /// `<home>/Code/<project_name>`.
    pub fn resolve(
        base_override: Option<&Path>,
        project_name: &str,
        home: Option<&Path>,
    ) -> Result<Self, JobError> {
        if let Some(base) = base_override {
            return Ok(Self::new(base));
        }
        let home = home.ok_or(JobError::HomeNotSet)?;
        Ok(Self::new(
            home.join(constants::CODE_DIRECTORY).join(project_name),
        ))
    }

    /// The base directory must exist; nothing else is checked up front.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.base.is_dir() {
            Ok(())
        } else {
            Err(JobError::MissingBaseDirectory(self.base.clone()))
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn directory(&self, directory: WellKnownDirectory) -> PathBuf {
        match directory.dir_name() {
            Some(name) => self.base.join(name),
            None => self.base.clone(),
        }
    }

    pub fn log_root(&self) -> PathBuf {
        self.directory(WellKnownDirectory::Log)
    }

    pub fn parent_log_path(&self, run: &RunDate) -> PathBuf {
        self.log_root().join(run.parent_log_name())
    }

    pub fn output_log_path(&self, run: &RunDate) -> PathBuf {
        self.log_root().join(run.output_log_name())
    }

    pub fn error_log_path(&self, run: &RunDate) -> PathBuf {
        self.log_root().join(run.error_log_name())
    }

    /// The settings file inside the base directory.
    pub fn settings_path(&self) -> PathBuf {
        self.base.join(constants::path::SETTINGS_FILE)
    }
}
