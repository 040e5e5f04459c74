// The run's clock, captured once at start so every dated name in a run agrees.

use crate::constants::{self, log_file};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::time::SystemTime;

/// Local date and time of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunDate {
    timestamp: NaiveDateTime,
    system_time: SystemTime,
}

impl RunDate {
    /// Capture the current local time.
    pub fn now() -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            system_time: SystemTime::now(),
        }
    }

    /// A fixed clock. `system_time` is what filesystem ages are measured against.
    pub fn fixed(timestamp: NaiveDateTime, system_time: SystemTime) -> Self {
        Self {
            timestamp,
            system_time,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn system_time(&self) -> SystemTime {
        self.system_time
    }

    /// `YYYY-MM-DD`, the name of today's rotation directory.
    pub fn date_string(&self) -> String {
        self.timestamp.format(constants::DATE_FORMAT).to_string()
    }

    /// `YYYY-MM-DD HH:MM:SS`, embedded in commit messages.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(constants::TIMESTAMP_FORMAT).to_string()
    }

    /// `<prefix><YYYY-MM-DD>.log`
    pub fn dated_log_name(&self, prefix: &str) -> String {
        format!("{prefix}{}.{}", self.date_string(), log_file::EXTENSION)
    }

    pub fn parent_log_name(&self) -> String {
        self.dated_log_name(log_file::PARENT_PREFIX)
    }

    pub fn output_log_name(&self) -> String {
        self.dated_log_name(log_file::OUTPUT_PREFIX)
    }

    pub fn error_log_name(&self) -> String {
        self.dated_log_name(log_file::ERROR_PREFIX)
    }

    /// Parse a directory name of the form `YYYY-MM-DD`.
    pub fn parse_dated_name(name: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(name, constants::DATE_FORMAT).ok()
    }
}
