// daily-sdk: foundation layer for the xkdc-daily job runner.
// This crate has no dependencies on other workspace crates and provides the
// trace abstraction, process execution and filesystem primitives.

pub mod build_constants;
pub mod command;
pub mod io_util;
pub mod process_invoker;
pub mod string_util;
pub mod trace;
pub mod which_util;

// Re-export commonly used items at crate root
pub use build_constants::{JobPackage, Source};
pub use command::{
    CommandOutput, CommandRunner, CommandSpec, OutputTarget, ProcessExitCodeError,
    RecordingCommandRunner,
};
pub use io_util::IOUtil;
pub use process_invoker::ProcessInvoker;
pub use string_util::StringUtil;
pub use trace::TraceWriter;
pub use which_util::WhichUtil;
