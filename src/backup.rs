// src/backup.rs

//! Backup engine: preserve snapshots and full safety snapshots
//!
//! Two kinds of copies live under the backup root:
//!
//! - **Preserve snapshots** hold only the preservation-set paths of one
//!   client. They bridge the gap between deleting the old checkout and
//!   restoring state into the fresh one, and are discarded afterwards.
//! - **Safety snapshots** are full recursive copies of a client directory.
//!   They are the rollback source when fetching fresh code fails and are
//!   never deleted automatically.
//!
//! Per-item failures while staging or restoring are collected as
//! [`BackupWarning`]s and never abort the remaining items.

use crate::error::Result;
use crate::paths::SAFETY_PREFIX;
use crate::preserve::PreservationSet;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Non-fatal failure to copy one preserved item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupWarning {
    pub item: String,
    pub reason: String,
}

impl fmt::Display for BackupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}

/// Items handled by a stage or restore pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageResult {
    /// Preservation entries actually copied, in preservation order
    pub items: Vec<String>,
    pub warnings: Vec<BackupWarning>,
}

/// A retained safety snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub username: String,
    pub path: PathBuf,
    /// Timestamp part of the directory name, including any collision suffix
    pub stamp: String,
}

impl SnapshotInfo {
    fn sort_key(&self) -> (String, u32) {
        match self.stamp.split_once('-') {
            Some((base, n)) => (base.to_string(), n.parse().unwrap_or(0)),
            None => (self.stamp.clone(), 0),
        }
    }
}

/// Stages, restores and snapshots client directories
#[derive(Debug, Clone)]
pub struct BackupEngine {
    preserve: PreservationSet,
    backup_dir: PathBuf,
}

impl BackupEngine {
    pub fn new(preserve: PreservationSet, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            preserve,
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn preservation_set(&self) -> &PreservationSet {
        &self.preserve
    }

    /// Copy every preserved path present in `client_dir` into `dest_dir`
    ///
    /// Fails only if `dest_dir` itself cannot be created.
    pub fn stage_preserve(&self, client_dir: &Path, dest_dir: &Path) -> Result<StageResult> {
        fs::create_dir_all(dest_dir)?;
        let mut result = StageResult::default();

        for item in self.preserve.iter() {
            let source = client_dir.join(item);
            if fs::symlink_metadata(&source).is_err() {
                continue;
            }

            match copy_path(&source, &dest_dir.join(item)) {
                Ok(()) => {
                    debug!("Preserved {}", item);
                    result.items.push(item.to_string());
                }
                Err(e) => {
                    warn!("Could not back up {}: {}", item, e);
                    result.warnings.push(BackupWarning {
                        item: item.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Put staged items back into a client directory
    ///
    /// Whatever the fresh checkout placed at a preserved path is removed
    /// first, so the staged copy replaces it rather than merging into it.
    pub fn restore_preserve(&self, src_dir: &Path, client_dir: &Path) -> StageResult {
        let mut result = StageResult::default();

        for item in self.preserve.iter() {
            let source = src_dir.join(item);
            if fs::symlink_metadata(&source).is_err() {
                continue;
            }

            let target = client_dir.join(item);
            let restored = remove_path(&target).and_then(|()| copy_path(&source, &target));
            match restored {
                Ok(()) => {
                    debug!("Restored {}", item);
                    result.items.push(item.to_string());
                }
                Err(e) => {
                    warn!("Could not restore {}: {}", item, e);
                    result.warnings.push(BackupWarning {
                        item: item.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        result
    }

    /// Full recursive copy of a client directory
    ///
    /// A failed copy is removed again so a partial snapshot is never
    /// mistaken for a usable rollback source.
    pub fn snapshot_full(&self, client_dir: &Path, snapshot_dir: &Path) -> Result<()> {
        info!(
            "Creating safety snapshot {} -> {}",
            client_dir.display(),
            snapshot_dir.display()
        );

        if let Err(e) = copy_dir(client_dir, snapshot_dir) {
            let _ = remove_path(snapshot_dir);
            return Err(e);
        }
        Ok(())
    }

    /// Replace a client directory with the contents of a safety snapshot
    pub fn restore_full(&self, snapshot_dir: &Path, client_dir: &Path) -> Result<()> {
        info!(
            "Restoring {} from safety snapshot {}",
            client_dir.display(),
            snapshot_dir.display()
        );

        remove_path(client_dir)?;
        copy_dir(snapshot_dir, client_dir)
    }

    /// Delete an ephemeral snapshot directory
    pub fn discard(&self, dir: &Path) -> Result<()> {
        remove_path(dir)
    }

    /// Retained safety snapshots for one client, newest first
    pub fn list_snapshots(&self, username: &str) -> Result<Vec<SnapshotInfo>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{SAFETY_PREFIX}{username}_");
        let stamp_pattern = Regex::new(r"^\d{8}_\d{6}(-\d+)?$")
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name.strip_prefix(&prefix) else {
                continue;
            };
            if !stamp_pattern.is_match(stamp) {
                continue;
            }
            snapshots.push(SnapshotInfo {
                username: username.to_string(),
                path: entry.path(),
                stamp: stamp.to_string(),
            });
        }

        snapshots.sort_by_key(|s| std::cmp::Reverse(s.sort_key()));
        Ok(snapshots)
    }

    /// Delete all but the newest `keep` safety snapshots of a client
    pub fn prune_snapshots(&self, username: &str, keep: usize) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for snapshot in self.list_snapshots(username)?.into_iter().skip(keep) {
            info!("Pruning safety snapshot {}", snapshot.path.display());
            remove_path(&snapshot.path)?;
            removed.push(snapshot.path);
        }
        Ok(removed)
    }
}

/// Copy a file, symlink or directory tree to `dst`
fn copy_path(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(src)?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if metadata.is_dir() {
        copy_dir(src, dst)
    } else if metadata.file_type().is_symlink() {
        copy_symlink(src, dst)
    } else {
        fs::copy(src, dst)?;
        Ok(())
    }
}

/// Recursive copy preserving file modes and symlinks
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let mut dir_modes = Vec::new();

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            dir_modes.push((target, entry.metadata()?.permissions()));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    // Apply directory modes last so read-only directories can still be filled
    for (dir, permissions) in dir_modes.into_iter().rev() {
        fs::set_permissions(&dir, permissions)?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}

/// Remove a file, symlink or directory tree; absent paths are fine
fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
