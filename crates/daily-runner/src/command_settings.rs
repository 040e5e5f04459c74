// Command-line arguments for `daily-runner`, and how they layer over the
// settings file.

use anyhow::Result;
use clap::{Parser, Subcommand};
use daily_common::{constants, ConfigurationStore, JobLayout, JobSettings};
use std::fmt;
use std::path::{Path, PathBuf};

/// Parsed command line.
#[derive(Parser, Debug)]
#[command(name = "daily-runner", version, about = "Runs the xkdc-daily scrape, rotate and publish job")]
pub struct Args {
    /// Project directory; defaults to ~/Code/xkdc-daily.
    #[arg(long, global = true, value_name = "PATH")]
    pub base_dir: Option<PathBuf>,

    /// Settings file; defaults to <base-dir>/.daily_settings.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Archive directories older than this many whole days.
    #[arg(long, global = true, value_name = "DAYS")]
    pub retention_days: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The whole pipeline (the default).
    Run,
    /// Start the SSH agent and sync the source checkout.
    Sync,
    /// Build and run the scraper container.
    Scrape,
    /// Move today's log files into log/<date>/.
    Rotate {
        /// Only log what would be moved.
        #[arg(long)]
        dry_run: bool,
    },
    /// Move old dated directories into archive/.
    Archive {
        #[arg(long)]
        dry_run: bool,
    },
    /// Commit and push archive, log and data.
    Publish,
    /// Verify tools and directory layout.
    Check,
}

impl Command {
    /// Whether the command appends to the dated parent log. Diagnostics and
    /// dry runs leave the log directory untouched.
    pub fn writes_parent_log(&self) -> bool {
        match self {
            Command::Check => false,
            Command::Rotate { dry_run } | Command::Archive { dry_run } => !dry_run,
            _ => true,
        }
    }

    /// Whether a missing base directory is fatal before the command starts.
    pub fn requires_base_dir(&self) -> bool {
        !matches!(self, Command::Check)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Run => "run",
            Command::Sync => "sync",
            Command::Scrape => "scrape",
            Command::Rotate { .. } => "rotate",
            Command::Archive { .. } => "archive",
            Command::Publish => "publish",
            Command::Check => "check",
        };
        write!(f, "{name}")
    }
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Resolve the layout and settings.
    ///
    /// An explicit `--settings` file is read first, so its project name can
    /// place the base directory; otherwise the settings file is looked up in
    /// the base directory. CLI flags override file values.
    pub fn resolve(&self, home: Option<&Path>) -> Result<(JobLayout, JobSettings)> {
        let (layout, mut settings) = match self.settings {
            Some(ref path) => {
                let settings = ConfigurationStore::new(path).load_settings()?;
                let layout =
                    JobLayout::resolve(self.base_dir.as_deref(), &settings.project_name, home)?;
                (layout, settings)
            }
            None => {
                let layout =
                    JobLayout::resolve(self.base_dir.as_deref(), constants::PROJECT_NAME, home)?;
                let settings = ConfigurationStore::new(layout.settings_path()).load_settings()?;
                (layout, settings)
            }
        };

        if let Some(days) = self.retention_days {
            settings.retention_days = days;
        }
        Ok((layout, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daily_common::JobError;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("daily-runner").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_subcommand_means_run() {
        let args = parse(&[]);
        assert_eq!(args.command(), Command::Run);
        assert!(!args.verbose);
        assert!(args.base_dir.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = parse(&["archive", "--dry-run", "--retention-days", "7", "--base-dir", "/srv/daily"]);
        assert_eq!(args.command(), Command::Archive { dry_run: true });
        assert_eq!(args.retention_days, Some(7));
        assert_eq!(args.base_dir.as_deref(), Some(Path::new("/srv/daily")));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Args::try_parse_from(["daily-runner", "deploy"]).is_err());
    }

    #[test]
    fn parent_log_only_for_real_work() {
        assert!(Command::Run.writes_parent_log());
        assert!(Command::Rotate { dry_run: false }.writes_parent_log());
        assert!(!Command::Rotate { dry_run: true }.writes_parent_log());
        assert!(!Command::Check.writes_parent_log());
        assert!(!Command::Check.requires_base_dir());
        assert_eq!(Command::Archive { dry_run: true }.to_string(), "archive");
    }

    #[test]
    fn resolve_reads_settings_from_base_and_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".daily_settings"),
            r#"{ "retention_days": 14, "branch": "trunk" }"#,
        )
        .unwrap();
        let base = dir.path().display().to_string();

        let (layout, settings) = parse(&["--base-dir", &base]).resolve(None).unwrap();
        assert_eq!(layout.base(), dir.path());
        assert_eq!(settings.retention_days, 14);
        assert_eq!(settings.branch, "trunk");

        let (_, settings) = parse(&["--base-dir", &base, "--retention-days", "3"])
            .resolve(None)
            .unwrap();
        assert_eq!(settings.retention_days, 3);
    }

    #[test]
    fn explicit_settings_file_names_the_project() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("daily.json");
        std::fs::write(&settings_path, r#"{ "project_name": "comics" }"#).unwrap();
        let settings_arg = settings_path.display().to_string();

        let (layout, _) = parse(&["--settings", &settings_arg])
            .resolve(Some(Path::new("/home/alex")))
            .unwrap();
        assert_eq!(layout.base(), Path::new("/home/alex/Code/comics"));
    }

    #[test]
    fn resolve_without_home_or_base_dir_fails() {
        let err = parse(&["sync"]).resolve(None).unwrap_err();
        assert!(matches!(err.downcast_ref::<JobError>(), Some(JobError::HomeNotSet)));
    }
}
