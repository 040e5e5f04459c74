// Constants for the daily job: names, layout, file naming and defaults.
// Nested modules group constants by concern.

use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Well-known directories under the project base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownDirectory {
    Base,
    Source,
    Data,
    Archive,
    Log,
}

impl WellKnownDirectory {
    /// The four directories bind-mounted into the container, in mount order.
    pub const MOUNTED: [WellKnownDirectory; 4] = [
        WellKnownDirectory::Source,
        WellKnownDirectory::Data,
        WellKnownDirectory::Archive,
        WellKnownDirectory::Log,
    ];

    /// The directories published to git, in publish order.
    pub const PUBLISHED: [WellKnownDirectory; 3] = [
        WellKnownDirectory::Archive,
        WellKnownDirectory::Log,
        WellKnownDirectory::Data,
    ];

    /// Directory name relative to the base path. `Base` has none.
    pub fn dir_name(&self) -> Option<&'static str> {
        match self {
            WellKnownDirectory::Base => None,
            WellKnownDirectory::Source => Some(path::SOURCE_DIRECTORY),
            WellKnownDirectory::Data => Some(path::DATA_DIRECTORY),
            WellKnownDirectory::Archive => Some(path::ARCHIVE_DIRECTORY),
            WellKnownDirectory::Log => Some(path::LOG_DIRECTORY),
        }
    }
}

impl fmt::Display for WellKnownDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir_name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "base"),
        }
    }
}

/// The signal used to decide how old a dated directory is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeSignal {
    /// Filesystem change time (ctime). Any metadata change resets the clock.
    #[default]
    ChangeTime,
    /// The `YYYY-MM-DD` date the directory is named after.
    DirectoryName,
}

impl fmt::Display for AgeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeSignal::ChangeTime => write!(f, "change-time"),
            AgeSignal::DirectoryName => write!(f, "directory-name"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level constants
// ---------------------------------------------------------------------------

/// Fixed project name; also the container image tag and the directory under `~/Code`.
pub const PROJECT_NAME: &str = "xkdc-daily";

/// Directory under `$HOME` that holds the project checkout.
pub const CODE_DIRECTORY: &str = "Code";

/// Printed to stdout once the container run has returned.
pub const COMPLETION_MESSAGE: &str = "xkdc-daily: scrape finished, rotating and publishing.";

/// Format of every dated file and directory name.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of the timestamp embedded in commit messages.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ---------------------------------------------------------------------------
// Nested constant groups
// ---------------------------------------------------------------------------

/// Directory names under the base path.
pub mod path {
    pub const SOURCE_DIRECTORY: &str = "src";
    pub const DATA_DIRECTORY: &str = "data";
    pub const ARCHIVE_DIRECTORY: &str = "archive";
    pub const LOG_DIRECTORY: &str = "log";

    /// Settings file looked up in the base directory.
    pub const SETTINGS_FILE: &str = ".daily_settings";
}

/// Dated log file naming: `<prefix><YYYY-MM-DD><extension>`.
pub mod log_file {
    /// The job's own diagnostic log.
    pub const PARENT_PREFIX: &str = "logfile_parent_";
    /// Container stdout.
    pub const OUTPUT_PREFIX: &str = "logfile_";
    /// Container stderr.
    pub const ERROR_PREFIX: &str = "errfile_";
    pub const EXTENSION: &str = "log";
}

/// Default values for settings that are not given in the settings file.
pub mod defaults {
    pub const RETENTION_DAYS: u64 = 30;
    pub const REMOTE_NAME: &str = "origin";
    pub const REMOTE_URL: &str = "git@github.com:xkdc-daily/xkdc-daily.git";
    pub const BRANCH: &str = "main";
    pub const SSH_KEY: &str = ".ssh/id_ed25519";
    pub const CONTAINER_ROOT: &str = "/app";
    pub const COMMIT_MESSAGE_TEMPLATE: &str = "Daily update {timestamp}";
}

/// Executables the job shells out to.
pub mod tools {
    pub const GIT: &str = "git";
    pub const DOCKER: &str = "docker";
    pub const SSH_AGENT: &str = "ssh-agent";
    pub const SSH_ADD: &str = "ssh-add";

    pub const ALL: [&str; 4] = [GIT, DOCKER, SSH_AGENT, SSH_ADD];
}

/// Environment variables read or written by the job.
pub mod variables {
    pub const HOME: &str = "HOME";
    pub const PRINT_LOG_TO_STDOUT: &str = "DAILY_PRINT_LOG_TO_STDOUT";
    pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";
    pub const SSH_AGENT_PID: &str = "SSH_AGENT_PID";
    pub const LC_ALL: &str = "LC_ALL";
}

/// Process exit codes.
pub mod return_code {
    pub const SUCCESS: i32 = 0;
    /// At least one step failed or was canceled.
    pub const STEP_FAILED: i32 = 1;
    /// The job could not start: missing base directory, bad settings.
    pub const SETUP_ERROR: i32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounted_directories_cover_layout() {
        let names: Vec<_> = WellKnownDirectory::MOUNTED
            .iter()
            .filter_map(|d| d.dir_name())
            .collect();
        assert_eq!(names, vec!["src", "data", "archive", "log"]);
    }

    #[test]
    fn published_order_is_archive_log_data() {
        let names: Vec<String> = WellKnownDirectory::PUBLISHED
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(names, vec!["archive", "log", "data"]);
    }

    #[test]
    fn age_signal_serializes_snake_case() {
        let json = serde_json::to_string(&AgeSignal::DirectoryName).unwrap();
        assert_eq!(json, "\"directory_name\"");
        assert_eq!(AgeSignal::default(), AgeSignal::ChangeTime);
    }
}
