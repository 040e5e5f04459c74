// Error types that callers match on. Everything else travels as `anyhow::Error`.

use std::path::PathBuf;

/// Failures that stop a job before its first step.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("HOME is not set; pass --base-dir to locate the project")]
    HomeNotSet,

    #[error("base directory '{}' does not exist", .0.display())]
    MissingBaseDirectory(PathBuf),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
