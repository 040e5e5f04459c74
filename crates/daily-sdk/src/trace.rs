/// Diagnostic output abstraction shared by every layer of the job.
///
/// Components never call `tracing` directly when they report on a child
/// process or a filesystem operation; they write through a `TraceWriter` so
/// tests can swap in a collecting or silent implementation.
pub trait TraceWriter: Send + Sync {
    /// Log an informational message.
    fn info(&self, message: &str);

    /// Log a verbose / debug message.
    fn verbose(&self, message: &str);

    /// Log a warning message.
    fn warning(&self, message: &str) {
        self.info(&format!("[warning] {message}"));
    }

    /// Log an error message.
    fn error(&self, message: &str) {
        self.info(&format!("[error] {message}"));
    }
}

/// Forwards to the `tracing` macros, tagging each event with a component name.
#[derive(Debug, Clone)]
pub struct TracingTraceWriter {
    component: &'static str,
}

impl TracingTraceWriter {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl Default for TracingTraceWriter {
    fn default() -> Self {
        Self::new("sdk")
    }
}

impl TraceWriter for TracingTraceWriter {
    fn info(&self, message: &str) {
        tracing::info!(component = self.component, "{}", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!(component = self.component, "{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!(component = self.component, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = self.component, "{}", message);
    }
}

/// Discards everything.
#[derive(Debug, Clone)]
pub struct NullTraceWriter;

impl TraceWriter for NullTraceWriter {
    fn info(&self, _message: &str) {}
    fn verbose(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// The level of a collected trace message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLevel {
    Info,
    Verbose,
    Warning,
    Error,
}

/// Keeps every message in memory so tests can assert on what was reported.
#[derive(Debug, Default)]
pub struct CollectingTraceWriter {
    messages: parking_lot::Mutex<Vec<(TraceLevel, String)>>,
}

impl CollectingTraceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return all collected messages.
    pub fn messages(&self) -> Vec<(TraceLevel, String)> {
        self.messages.lock().clone()
    }

    /// Whether any message at `level` contains `needle`.
    pub fn contains(&self, level: TraceLevel, needle: &str) -> bool {
        self.messages
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    fn push(&self, level: TraceLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

impl TraceWriter for CollectingTraceWriter {
    fn info(&self, message: &str) {
        self.push(TraceLevel::Info, message);
    }

    fn verbose(&self, message: &str) {
        self.push(TraceLevel::Verbose, message);
    }

    fn warning(&self, message: &str) {
        self.push(TraceLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(TraceLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_writer_keeps_order_and_level() {
        let writer = CollectingTraceWriter::new();
        writer.info("hello");
        writer.warning("warn");
        writer.error("err");
        writer.verbose("verb");
        let msgs = writer.messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0], (TraceLevel::Info, "hello".into()));
        assert_eq!(msgs[1], (TraceLevel::Warning, "warn".into()));
        assert_eq!(msgs[2], (TraceLevel::Error, "err".into()));
        assert_eq!(msgs[3], (TraceLevel::Verbose, "verb".into()));
        assert!(writer.contains(TraceLevel::Error, "er"));
        assert!(!writer.contains(TraceLevel::Info, "warn"));
    }

    #[test]
    fn default_warning_routes_through_info() {
        struct InfoOnly(CollectingTraceWriter);
        impl TraceWriter for InfoOnly {
            fn info(&self, message: &str) {
                self.0.info(message);
            }
            fn verbose(&self, _message: &str) {}
        }

        let writer = InfoOnly(CollectingTraceWriter::new());
        writer.warning("disk full");
        assert!(writer.0.contains(TraceLevel::Info, "[warning] disk full"));
    }

    #[test]
    fn null_writer_does_not_panic() {
        let writer = NullTraceWriter;
        writer.info("test");
        writer.verbose("test");
        writer.warning("test");
        writer.error("test");
    }
}
