use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::{thread, time::Duration};
use walkdir::WalkDir;

/// Filesystem helpers used by rotation, archival and the settings store.
pub struct IOUtil;

impl IOUtil {
    /// Move a file or directory to `destination`, which must not exist.
    ///
    /// Tries a rename first. When source and destination live on different
    /// filesystems the tree is copied and the source deleted afterwards.
    pub fn move_path(source: &Path, destination: &Path) -> Result<()> {
        if destination.symlink_metadata().is_ok() {
            anyhow::bail!(
                "Cannot move '{}': destination '{}' already exists",
                source.display(),
                destination.display()
            );
        }

        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if Self::is_cross_device(&e) => {
                tracing::debug!(
                    "Rename across filesystems, copying '{}' to '{}'",
                    source.display(),
                    destination.display()
                );
                Self::copy_tree(source, destination)?;
                if source.is_dir() {
                    Self::delete_directory(source)
                } else {
                    Self::delete_file(source)
                }
            }
            Err(e) => Err(e).with_context(|| {
                format!(
                    "Failed to move '{}' to '{}'",
                    source.display(),
                    destination.display()
                )
            }),
        }
    }

    /// Append the bytes of `source` to `destination` and remove `source`.
    pub fn append_file_into(source: &Path, destination: &Path) -> Result<u64> {
        let mut reader = fs::File::open(source)
            .with_context(|| format!("Failed to open '{}'", source.display()))?;
        let mut writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)
            .with_context(|| format!("Failed to open '{}' for append", destination.display()))?;
        let copied = io::copy(&mut reader, &mut writer).with_context(|| {
            format!(
                "Failed to append '{}' to '{}'",
                source.display(),
                destination.display()
            )
        })?;
        drop(reader);
        Self::delete_file(source)?;
        Ok(copied)
    }

    /// Merge the directory `source` into the existing directory `destination`.
    ///
    /// Entries missing from `destination` are moved; sub-directories present
    /// on both sides are merged recursively. An entry whose destination is
    /// already taken stays where it is and is returned as a conflict. `source`
    /// is removed once it is empty.
    pub fn merge_directory(source: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
        let mut conflicts = Vec::new();

        let mut entries: Vec<PathBuf> = fs::read_dir(source)
            .with_context(|| format!("Failed to read directory '{}'", source.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        entries.sort();

        for entry in entries {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let target = destination.join(name);
            match target.symlink_metadata() {
                Err(_) => Self::move_path(&entry, &target)?,
                Ok(meta) if meta.is_dir() && entry.is_dir() => {
                    conflicts.extend(Self::merge_directory(&entry, &target)?);
                }
                Ok(_) => conflicts.push(entry),
            }
        }

        if Self::is_dir_empty(source)? {
            fs::remove_dir(source)
                .with_context(|| format!("Failed to remove '{}'", source.display()))?;
        }

        Ok(conflicts)
    }

    pub fn is_dir_empty(path: &Path) -> Result<bool> {
        let mut entries = fs::read_dir(path)
            .with_context(|| format!("Failed to read directory '{}'", path.display()))?;
        Ok(entries.next().is_none())
    }

    /// Recursively delete a directory with retry logic.
    pub fn delete_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        if path.symlink_metadata()?.file_type().is_symlink() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove symlink '{}'", path.display()))?;
            return Ok(());
        }

        let max_retries = 3;
        let mut last_err = None;

        for attempt in 0..max_retries {
            match fs::remove_dir_all(path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < max_retries - 1 {
                        thread::sleep(Duration::from_millis(100 * (attempt as u64 + 1)));
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "unknown error"));
        Err(err).with_context(|| {
            format!(
                "Failed to delete directory '{}' after {} retries",
                path.display(),
                max_retries
            )
        })
    }

    /// Delete a single file. Missing files are not an error.
    pub fn delete_file(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete file '{}'", path.display())),
        }
    }

    /// Read a file and deserialize it from JSON.
    pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file '{}'", path.display()))?;
        let value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to deserialize JSON from '{}'", path.display()))?;
        Ok(value)
    }

    fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
        if source.is_file() {
            fs::copy(source, destination).with_context(|| {
                format!("Failed to copy '{}' to '{}'", source.display(), destination.display())
            })?;
            return Ok(());
        }

        for entry in WalkDir::new(source).follow_links(false) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(source)?;
            let target = destination.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create '{}'", target.display()))?;
            } else if file_type.is_symlink() {
                Self::copy_symlink(entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target).with_context(|| {
                    format!("Failed to copy '{}'", entry.path().display())
                })?;
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
        let link = fs::read_link(source)?;
        std::os::unix::fs::symlink(link, destination)
            .with_context(|| format!("Failed to recreate symlink '{}'", destination.display()))
    }

    #[cfg(not(unix))]
    fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
        fs::copy(source, destination)?;
        Ok(())
    }

    #[cfg(unix)]
    fn is_cross_device(err: &io::Error) -> bool {
        err.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
    }

    #[cfg(not(unix))]
    fn is_cross_device(_err: &io::Error) -> bool {
        false
    }
}
