// src/lock.rs

//! Per-client advisory lock
//!
//! Updates are run by a single operator, one client at a time. The lock only
//! guards against a second operator starting an update of the same client
//! while the first one is still working in the backup area.
//!
//! # Lock Strategy
//!
//! - One lock file per client: `<backup_dir>/locks/<username>.lock`
//! - `flock(LOCK_EX)` via fs2, tried five times with exponential backoff
//! - Released when the guard is dropped

use crate::error::{Error, Result};
use crate::paths::lock_path;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Attempts before giving up, with 100, 200, 400 and 800 ms pauses in between
const MAX_RETRIES: u32 = 5;

/// Exclusive lock on one client's update
#[derive(Debug)]
pub struct ClientLock {
    file: File,
    path: PathBuf,
}

impl ClientLock {
    /// Acquire the lock for `username`, failing with `ClientBusy` when held
    pub fn acquire(backup_dir: &Path, username: &str) -> Result<Self> {
        let path = lock_path(backup_dir, username);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;

        for attempt in 0..MAX_RETRIES {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Acquired client lock {}", path.display());
                    return Ok(Self { file, path });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if attempt < MAX_RETRIES - 1 {
                        std::thread::sleep(Duration::from_millis(100 * (1 << attempt)));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::ClientBusy(username.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ClientLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
