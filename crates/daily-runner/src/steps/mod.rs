// Steps module - the units of the daily pipeline, in run order.

pub mod archival;
pub mod completion;
pub mod git_sync;
pub mod publish;
pub mod rotation;
pub mod scrape;
pub mod ssh_agent;

pub use archival::ArchivalStep;
pub use completion::CompletionStep;
pub use git_sync::GitSyncStep;
pub use publish::PublishStep;
pub use rotation::RotationStep;
pub use scrape::ScrapeStep;
pub use ssh_agent::SshAgentStep;

use std::fmt;
use std::path::PathBuf;

/// One filesystem move decided by rotation or archival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl PlannedMove {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for PlannedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.display(), self.destination.display())
    }
}
