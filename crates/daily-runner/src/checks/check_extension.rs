// Check result type shared by the environment checks.

/// Result of a single diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// The name of the check (e.g. "git").
    pub name: String,
    /// A description of what the check verifies.
    pub description: String,
    pub passed: bool,
    /// Additional detail about the result (a resolved path or an error message).
    pub detail: Option<String>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            passed: true,
            detail: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(
        name: impl Into<String>,
        description: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
