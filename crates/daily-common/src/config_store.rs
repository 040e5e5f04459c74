// ConfigurationStore: loads job settings from the optional JSON settings file.

use crate::constants::{self, defaults, AgeSignal};
use crate::error::JobError;

use anyhow::Result;
use daily_sdk::IOUtil;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// JobSettings
// ---------------------------------------------------------------------------

/// Persisted job configuration. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Names the base directory under `~/Code` and, by default, the image tag.
    pub project_name: String,

    /// Directories strictly older than this many whole days are archived.
    pub retention_days: u64,

    /// How a dated directory's age is measured.
    pub age_signal: AgeSignal,

    /// Remote of the source checkout that gets its URL reset on every run.
    pub remote_name: String,

    pub remote_url: String,

    pub branch: String,

    /// SSH key registered with the agent. Relative paths are under `$HOME`.
    pub ssh_key: PathBuf,

    /// Container image tag; defaults to the project name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,

    /// Mount point of the four bind mounts inside the container.
    pub container_root: String,

    /// Commit message; `{timestamp}` and `{directory}` are expanded.
    pub commit_message_template: String,

    /// When false, the first failing step skips the rest of the pipeline.
    pub continue_on_error: bool,

    /// Per-step timeout in minutes; 0 disables it.
    pub step_timeout_minutes: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            project_name: constants::PROJECT_NAME.to_string(),
            retention_days: defaults::RETENTION_DAYS,
            age_signal: AgeSignal::default(),
            remote_name: defaults::REMOTE_NAME.to_string(),
            remote_url: defaults::REMOTE_URL.to_string(),
            branch: defaults::BRANCH.to_string(),
            ssh_key: PathBuf::from(defaults::SSH_KEY),
            image_tag: None,
            container_root: defaults::CONTAINER_ROOT.to_string(),
            commit_message_template: defaults::COMMIT_MESSAGE_TEMPLATE.to_string(),
            continue_on_error: true,
            step_timeout_minutes: 0,
        }
    }
}

impl JobSettings {
    pub fn image_tag(&self) -> &str {
        self.image_tag.as_deref().unwrap_or(&self.project_name)
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        match self.step_timeout_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        }
    }

    /// Absolute path of the SSH key, resolving relative paths against `home`.
    pub fn ssh_key_path(&self, home: Option<&Path>) -> PathBuf {
        match home {
            Some(home) if self.ssh_key.is_relative() => home.join(&self.ssh_key),
            _ => self.ssh_key.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), JobError> {
        if self.project_name.trim().is_empty() {
            return Err(JobError::InvalidSettings(
                "project_name cannot be empty".to_string(),
            ));
        }
        if self.project_name.contains('/') {
            return Err(JobError::InvalidSettings(format!(
                "project_name '{}' must be a single path component",
                self.project_name
            )));
        }
        if self.remote_url.trim().is_empty() {
            return Err(JobError::InvalidSettings("remote_url cannot be empty".to_string()));
        }
        if self.branch.trim().is_empty() {
            return Err(JobError::InvalidSettings("branch cannot be empty".to_string()));
        }
        if !self.container_root.starts_with('/') {
            return Err(JobError::InvalidSettings(format!(
                "container_root '{}' must be an absolute path",
                self.container_root
            )));
        }
        if self.commit_message_template.trim().is_empty() {
            return Err(JobError::InvalidSettings(
                "commit_message_template cannot be empty".to_string(),
            ));
        }
        if self.image_tag.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(JobError::InvalidSettings("image_tag cannot be empty".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigurationStore
// ---------------------------------------------------------------------------

/// Reads and writes the settings file.
pub struct ConfigurationStore {
    settings_path: PathBuf,
}

impl ConfigurationStore {
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn is_configured(&self) -> bool {
        self.settings_path.is_file()
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load_settings(&self) -> Result<JobSettings> {
        let settings = if self.is_configured() {
            tracing::debug!("Loading settings from {}", self.settings_path.display());
            IOUtil::load_object::<JobSettings>(&self.settings_path)?
        } else {
            JobSettings::default()
        };
        settings.validate()?;
        Ok(settings)
    }
}
