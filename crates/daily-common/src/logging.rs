// Subscriber setup: diagnostics go to stderr and to the dated parent log.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Default filter when `RUST_LOG` is not set.
fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Open `path` for append, creating its parent directory.
pub fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory '{}'", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))
}

/// Append handle on the parent log shared by the subscriber and the host.
///
/// Rotation moves the file while it is open. `reopen` points later events at
/// the rotated path, which matters when rotation appended the file into an
/// existing one and unlinked it.
#[derive(Clone)]
pub struct ParentLog {
    inner: Arc<Mutex<(PathBuf, File)>>,
}

impl ParentLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_append(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new((path.to_path_buf(), file))),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.inner.lock().0.clone()
    }

    pub fn reopen(&self, path: &Path) -> Result<()> {
        let file = open_append(path)?;
        *self.inner.lock() = (path.to_path_buf(), file);
        Ok(())
    }
}

impl Write for ParentLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().1.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().1.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().1.flush()
    }
}

/// Install the global subscriber.
///
/// With `parent_log` set, every event is also appended (without colors) to
/// that file for the rest of the process, the same way the job's stderr used
/// to be redirected into `logfile_parent_<date>.log`. The returned handle
/// follows the file through rotation.
pub fn init(parent_log: Option<&Path>, verbose: bool) -> Result<Option<ParentLog>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .boxed();

    let parent_log = parent_log.map(ParentLog::open).transpose()?;
    let file_layer = parent_log.clone().map(|writer| {
        fmt::layer()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("A global tracing subscriber is already installed")?;
    Ok(parent_log)
}
