// Rotation step: move the run's flat `*.log` files into `log/<today>/`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use daily_common::constants::log_file;
use daily_sdk::{IOUtil, TraceWriter};
use std::fs;
use std::path::Path;

use super::PlannedMove;
use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

/// What `apply_rotation` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RotationSummary {
    pub moved: usize,
    /// Files appended to a same-named file already in the dated directory.
    pub appended: usize,
}

/// Plan moving every top-level regular `.log` file of `log_root` into
/// `log_root/<date_dir>/`. A missing log root plans nothing.
pub fn plan_rotation(log_root: &Path, date_dir: &str) -> Result<Vec<PlannedMove>> {
    if !log_root.is_dir() {
        return Ok(Vec::new());
    }

    let target_dir = log_root.join(date_dir);
    let mut plan = Vec::new();
    for entry in fs::read_dir(log_root)
        .with_context(|| format!("Failed to read directory '{}'", log_root.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(log_file::EXTENSION) {
            continue;
        }
        plan.push(PlannedMove::new(&path, target_dir.join(entry.file_name())));
    }
    plan.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(plan)
}

/// Carry out a rotation plan. Every move is attempted; the first error is
/// returned after the rest have run.
pub fn apply_rotation(plan: &[PlannedMove], trace: &dyn TraceWriter) -> Result<RotationSummary> {
    let mut summary = RotationSummary::default();
    let mut failures = Vec::new();

    for planned in plan {
        match rotate_one(planned) {
            Ok(true) => {
                trace.info(&format!("Appended {planned}"));
                summary.appended += 1;
            }
            Ok(false) => {
                trace.verbose(&format!("Moved {planned}"));
                summary.moved += 1;
            }
            Err(e) => {
                trace.error(&format!("{e:#}"));
                failures.push(e);
            }
        }
    }

    match failures.into_iter().next() {
        Some(first) => Err(first.context("Log rotation did not complete")),
        None => Ok(summary),
    }
}

/// Returns true when the file was appended to an existing one.
fn rotate_one(planned: &PlannedMove) -> Result<bool> {
    if let Some(parent) = planned.destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    if planned.destination.exists() {
        IOUtil::append_file_into(&planned.source, &planned.destination)?;
        Ok(true)
    } else {
        IOUtil::move_path(&planned.source, &planned.destination)?;
        Ok(false)
    }
}

pub struct RotationStep {
    dry_run: bool,
}

impl RotationStep {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl Step for RotationStep {
    fn name(&self) -> &str {
        "rotate"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        let host = context.host_context();
        let log_root = host.layout().log_root();
        let date_dir = host.run_date().date_string();

        let dated = log_root.join(&date_dir);
        if !self.dry_run {
            // Created even when there is nothing to move.
            fs::create_dir_all(&dated)
                .with_context(|| format!("Failed to create '{}'", dated.display()))?;
        }

        let plan = plan_rotation(&log_root, &date_dir)?;
        if self.dry_run {
            for planned in &plan {
                context.info(&format!("Would move {planned}"));
            }
            context.info(&format!("{} log file(s) would be rotated", plan.len()));
            return Ok(());
        }

        let trace = host.get_trace(context.step_name());
        let applied = apply_rotation(&plan, &trace);
        for planned in &plan {
            if !planned.source.exists() && planned.destination.is_file() {
                host.follow_parent_log(&planned.source, &planned.destination)?;
            }
        }
        let summary = applied?;
        context.info(&format!(
            "Rotated {} log file(s) into {} ({} appended)",
            summary.moved + summary.appended,
            dated.display(),
            summary.appended
        ));
        Ok(())
    }
}
