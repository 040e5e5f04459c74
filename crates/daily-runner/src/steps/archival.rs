// Archival step: move dated directories past the retention threshold out of
// `log/` and `data/` into `archive/`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use daily_common::constants::SECONDS_PER_DAY;
use daily_common::{AgeSignal, JobLayout, RunDate, WellKnownDirectory};
use daily_sdk::{IOUtil, TraceWriter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::PlannedMove;
use crate::execution_context::ExecutionContext;
use crate::steps_runner::Step;

/// Roots scanned for dated directories.
const ARCHIVED_ROOTS: [WellKnownDirectory; 2] = [WellKnownDirectory::Log, WellKnownDirectory::Data];

/// What `apply_archival` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchivalSummary {
    pub moved: usize,
    /// Sources merged into a directory that already existed in the archive.
    pub merged: usize,
    /// Entries left in place because the archive already had them.
    pub conflicts: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Age
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn change_time(meta: &fs::Metadata) -> SystemTime {
    use std::os::unix::fs::MetadataExt;
    match u64::try_from(meta.ctime()) {
        Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
        Err(_) => UNIX_EPOCH,
    }
}

#[cfg(not(unix))]
fn change_time(meta: &fs::Metadata) -> SystemTime {
    meta.modified().unwrap_or(UNIX_EPOCH)
}

/// Whole days between `then` and `now`, rounded down. Future times are 0 days old.
pub fn whole_days_between(then: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(then)
        .map(|elapsed| elapsed.as_secs() / SECONDS_PER_DAY)
        .unwrap_or(0)
}

/// Age of `path` in whole days, or `None` when the signal does not apply
/// (an undated name under `AgeSignal::DirectoryName`).
pub fn age_in_days(path: &Path, signal: AgeSignal, run: &RunDate) -> Result<Option<u64>> {
    match signal {
        AgeSignal::ChangeTime => {
            let meta = fs::metadata(path)
                .with_context(|| format!("Failed to stat '{}'", path.display()))?;
            Ok(Some(whole_days_between(change_time(&meta), run.system_time())))
        }
        AgeSignal::DirectoryName => {
            let dated = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(RunDate::parse_dated_name);
            Ok(dated.map(|date: NaiveDate| {
                u64::try_from((run.date() - date).num_days()).unwrap_or(0)
            }))
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with('.'))
}

// ---------------------------------------------------------------------------
// Plan / apply
// ---------------------------------------------------------------------------

/// Plan moving every top-level directory of `log/` and `data/` that is more
/// than `retention_days` whole days old to `archive/<name>`. Hidden entries
/// (the roots' own `.git`) are never candidates.
pub fn plan_archival(
    layout: &JobLayout,
    retention_days: u64,
    signal: AgeSignal,
    run: &RunDate,
) -> Result<Vec<PlannedMove>> {
    let archive = layout.directory(WellKnownDirectory::Archive);
    let mut plan = Vec::new();

    for root in ARCHIVED_ROOTS {
        let root = layout.directory(root);
        if !root.is_dir() {
            continue;
        }

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&root)
            .with_context(|| format!("Failed to read directory '{}'", root.display()))?
        {
            let entry = entry?;
            if is_hidden(&entry.path()) {
                continue;
            }
            if entry.file_type()?.is_dir() {
                candidates.push(entry.path());
            }
        }
        candidates.sort();

        for path in candidates {
            match age_in_days(&path, signal, run)? {
                Some(age) if age > retention_days => {
                    if let Some(name) = path.file_name() {
                        let destination = archive.join(name);
                        plan.push(PlannedMove::new(path, destination));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(plan)
}

/// Carry out an archival plan. Every move is attempted; the first error is
/// returned after the rest have run.
pub fn apply_archival(plan: &[PlannedMove], trace: &dyn TraceWriter) -> Result<ArchivalSummary> {
    let mut summary = ArchivalSummary::default();
    let mut failures = Vec::new();

    for planned in plan {
        match archive_one(planned) {
            Ok(None) => {
                trace.info(&format!("Archived {planned}"));
                summary.moved += 1;
            }
            Ok(Some(conflicts)) => {
                trace.info(&format!("Merged {planned}"));
                for conflict in &conflicts {
                    trace.warning(&format!(
                        "Left '{}' in place: the archive already has an entry with that name",
                        conflict.display()
                    ));
                }
                summary.merged += 1;
                summary.conflicts.extend(conflicts);
            }
            Err(e) => {
                trace.error(&format!("{e:#}"));
                failures.push(e);
            }
        }
    }

    match failures.into_iter().next() {
        Some(first) => Err(first.context("Archival did not complete")),
        None => Ok(summary),
    }
}

/// `None` for a plain move, the conflicts for a merge.
fn archive_one(planned: &PlannedMove) -> Result<Option<Vec<PathBuf>>> {
    if let Some(parent) = planned.destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    if planned.destination.is_dir() {
        Ok(Some(IOUtil::merge_directory(
            &planned.source,
            &planned.destination,
        )?))
    } else {
        IOUtil::move_path(&planned.source, &planned.destination)?;
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

pub struct ArchivalStep {
    dry_run: bool,
}

impl ArchivalStep {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl Step for ArchivalStep {
    fn name(&self) -> &str {
        "archive"
    }

    async fn run(&self, context: &ExecutionContext) -> Result<()> {
        let host = context.host_context();
        let settings = host.settings();
        context.debug(&format!(
            "Archiving directories older than {} day(s) by {}",
            settings.retention_days, settings.age_signal
        ));

        let plan = plan_archival(
            host.layout(),
            settings.retention_days,
            settings.age_signal,
            host.run_date(),
        )?;

        if self.dry_run {
            for planned in &plan {
                context.info(&format!("Would move {planned}"));
            }
            context.info(&format!("{} directory(ies) would be archived", plan.len()));
            return Ok(());
        }

        let trace = host.get_trace(context.step_name());
        let summary = apply_archival(&plan, &trace)?;
        context.info(&format!(
            "Archived {} directory(ies), {} merged, {} conflict(s)",
            summary.moved + summary.merged,
            summary.merged,
            summary.conflicts.len()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{run_date_at, run_date_days_ahead, TestHost};
    use daily_common::JobSettings;
    use daily_sdk::trace::NullTraceWriter;

    #[test]
    fn whole_days_round_down() {
        let now = SystemTime::now();
        let day = Duration::from_secs(SECONDS_PER_DAY);
        assert_eq!(whole_days_between(now - day * 30, now), 30);
        assert_eq!(whole_days_between(now - day * 31 + Duration::from_secs(1), now), 30);
        assert_eq!(whole_days_between(now + day, now), 0);
    }

    #[test]
    fn directory_name_age() {
        let dir = tempfile::tempdir().unwrap();
        let run = run_date_at(SystemTime::now());
        let age = |name: &str| age_in_days(&dir.path().join(name), AgeSignal::DirectoryName, &run);
        assert_eq!(age("2023-11-20").unwrap(), Some(42));
        assert_eq!(age("2024-01-01").unwrap(), Some(0));
        assert_eq!(age("2024-02-01").unwrap(), Some(0));
        assert_eq!(age("latest").unwrap(), None);
    }

    #[test]
    fn change_time_threshold_is_strict() {
        let host = TestHost::new();
        fs::create_dir(host.base.join("data/2023-12-01")).unwrap();
        let layout = host.context.layout().clone();

        // 30 whole days old is not older than 30 days
        let plan = plan_archival(&layout, 30, AgeSignal::ChangeTime, &run_date_days_ahead(30)).unwrap();
        assert!(plan.is_empty());

        let plan = plan_archival(&layout, 30, AgeSignal::ChangeTime, &run_date_days_ahead(31)).unwrap();
        assert_eq!(
            plan,
            vec![PlannedMove::new(
                host.base.join("data/2023-12-01"),
                host.base.join("archive/2023-12-01")
            )]
        );
    }

    #[test]
    fn plan_ignores_files_and_recent_directories() {
        let host = TestHost::new();
        host.write("log/logfile_2023-10-01.log", "flat file");
        fs::create_dir(host.base.join("log/2023-10-01")).unwrap();
        fs::create_dir(host.base.join("log/2023-12-15")).unwrap();
        fs::create_dir(host.base.join("data/scratch")).unwrap();

        let plan = plan_archival(
            host.context.layout(),
            30,
            AgeSignal::DirectoryName,
            host.context.run_date(),
        )
        .unwrap();

        assert_eq!(
            plan,
            vec![PlannedMove::new(
                host.base.join("log/2023-10-01"),
                host.base.join("archive/2023-10-01")
            )]
        );
    }

    #[test]
    fn same_date_from_log_and_data_is_merged() {
        let host = TestHost::new();
        host.write("log/2023-11-20/logfile_2023-11-20.log", "log");
        host.write("data/2023-11-20/comics.json", "[]");
        host.write("data/2023-11-20/logfile_2023-11-20.log", "clash");

        let plan = plan_archival(
            host.context.layout(),
            30,
            AgeSignal::DirectoryName,
            host.context.run_date(),
        )
        .unwrap();
        assert_eq!(plan.len(), 2);

        let summary = apply_archival(&plan, &NullTraceWriter).unwrap();

        let archived = host.base.join("archive/2023-11-20");
        assert_eq!(summary.moved, 1);
        assert_eq!(summary.merged, 1);
        assert_eq!(
            summary.conflicts,
            vec![host.base.join("data/2023-11-20/logfile_2023-11-20.log")]
        );
        assert!(archived.join("comics.json").is_file());
        assert_eq!(
            fs::read_to_string(archived.join("logfile_2023-11-20.log")).unwrap(),
            "log"
        );
        assert!(!host.base.join("log/2023-11-20").exists());
        // The conflicting entry keeps its source directory alive.
        assert!(host.base.join("data/2023-11-20").is_dir());
    }

    #[tokio::test]
    async fn step_archives_by_change_time() {
        let host = TestHost::with(JobSettings::default(), run_date_days_ahead(40));
        host.write("log/2023-11-20/logfile_2023-11-20.log", "old");
        host.write("data/2023-11-20/comics.json", "[]");
        let context = host.execution_context("archive");

        ArchivalStep::new(false).run(&context).await.unwrap();

        assert!(host.base.join("archive/2023-11-20/logfile_2023-11-20.log").is_file());
        assert!(host.base.join("archive/2023-11-20/comics.json").is_file());
        assert!(!host.base.join("log/2023-11-20").exists());
        assert!(!host.base.join("data/2023-11-20").exists());
    }

    #[tokio::test]
    async fn repository_metadata_stays_put() {
        let host = TestHost::with(JobSettings::default(), run_date_days_ahead(40));
        host.write("archive/.git/HEAD", "ref: refs/heads/main\n");
        host.write("log/.git/HEAD", "ref: refs/heads/main\n");
        host.write("log/.git/objects/ab/cdef", "log object");
        host.write("data/.git/HEAD", "ref: refs/heads/main\n");
        host.write("log/2023-11-20/logfile_2023-11-20.log", "old");
        let context = host.execution_context("archive");

        let plan = plan_archival(
            host.context.layout(),
            30,
            AgeSignal::ChangeTime,
            host.context.run_date(),
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![PlannedMove::new(
                host.base.join("log/2023-11-20"),
                host.base.join("archive/2023-11-20")
            )]
        );

        ArchivalStep::new(false).run(&context).await.unwrap();

        assert!(host.base.join("log/.git/objects/ab/cdef").is_file());
        assert!(host.base.join("data/.git/HEAD").is_file());
        assert!(!host.base.join("archive/.git/objects").exists());
        assert!(host.base.join("archive/2023-11-20/logfile_2023-11-20.log").is_file());
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let host = TestHost::with(JobSettings::default(), run_date_days_ahead(40));
        host.write("data/2023-11-20/comics.json", "[]");
        let context = host.execution_context("archive");

        ArchivalStep::new(true).run(&context).await.unwrap();

        assert!(host.base.join("data/2023-11-20/comics.json").is_file());
        assert!(!host.base.join("archive/2023-11-20").exists());
    }
}
