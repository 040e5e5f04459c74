/// Build metadata baked in at compile time.

/// Source control information.
pub struct Source;

impl Source {
    /// The commit hash this binary was built from.
    /// Set via the `DAILY_COMMIT_HASH` env var at compile time, or "N/A".
    pub const COMMIT_HASH: &'static str = match option_env!("DAILY_COMMIT_HASH") {
        Some(h) => h,
        None => "N/A",
    };
}

/// Package metadata.
#[derive(Debug, Clone)]
pub struct JobPackage;

impl JobPackage {
    /// Pulled from `CARGO_PKG_VERSION`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!JobPackage::VERSION.is_empty());
    }

    #[test]
    fn commit_hash_has_default() {
        assert!(!Source::COMMIT_HASH.is_empty());
    }
}
