// daily-common: shared services for the daily job.
// Settings, directory layout, run clock, step results, tracing and the host
// context that every pipeline step receives. Depends on `daily-sdk`.

pub mod config_store;
pub mod constants;
pub mod error;
pub mod host_context;
pub mod layout;
pub mod logging;
pub mod run_date;
pub mod step_result;
pub mod trace_manager;

// ---------------------------------------------------------------------------
// Re-exports for convenient access
// ---------------------------------------------------------------------------

pub use config_store::{ConfigurationStore, JobSettings};
pub use constants::{AgeSignal, WellKnownDirectory};
pub use error::JobError;
pub use host_context::JobHostContext;
pub use layout::JobLayout;
pub use run_date::RunDate;
pub use step_result::{job_result, StepOutcome, StepResult};
pub use trace_manager::{TraceManager, TraceSetting, Tracing};
