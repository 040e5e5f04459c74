// Per-component trace sources on top of the `tracing` crate.

use daily_sdk::TraceWriter;

/// Configuration for trace output.
#[derive(Debug, Clone, Default)]
pub struct TraceSetting {
    /// Whether to also print each line to stdout.
    pub print_to_stdout: bool,
}

/// A named trace source. Each component gets its own `Tracing`; the name ends
/// up as the `component` field of every event.
#[derive(Debug, Clone)]
pub struct Tracing {
    name: String,
    setting: TraceSetting,
}

impl Tracing {
    pub fn new(name: impl Into<String>, setting: TraceSetting) -> Self {
        Self {
            name: name.into(),
            setting,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn mirror(&self, level: &str, message: &str) {
        if self.setting.print_to_stdout {
            println!("[{}] {}: {}", self.name, level, message);
        }
    }
}

impl TraceWriter for Tracing {
    fn info(&self, message: &str) {
        tracing::info!(component = %self.name, "{}", message);
        self.mirror("INFO", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!(component = %self.name, "{}", message);
        self.mirror("VERB", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!(component = %self.name, "{}", message);
        self.mirror("WARN", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = %self.name, "{}", message);
        self.mirror("ERR ", message);
    }
}

/// Hands out trace sources that share one setting.
#[derive(Debug, Clone, Default)]
pub struct TraceManager {
    default_setting: TraceSetting,
}

impl TraceManager {
    pub fn with_setting(setting: TraceSetting) -> Self {
        Self {
            default_setting: setting,
        }
    }

    /// Get (create) a named trace source.
    pub fn get(&self, name: &str) -> Tracing {
        Tracing::new(name, self.default_setting.clone())
    }
}
