// src/paths.rs
//! Centralized path derivation for snapshot and lock locations
//!
//! Every location under the backup root is namespaced by username and a
//! local timestamp so that clients never share a snapshot directory.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Timestamp format embedded in snapshot directory names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Prefix of ephemeral preserve snapshots
pub const PRESERVE_PREFIX: &str = "temp_update_";

/// Prefix of retained full-directory safety snapshots
pub const SAFETY_PREFIX: &str = "full_backup_";

/// Prefix of fleet-wide session backups
pub const SESSIONS_PREFIX: &str = "sessions_";

/// Format a timestamp for use in a directory name
pub fn timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Ephemeral location for a client's preserved paths
pub fn preserve_snapshot_dir(backup_dir: &Path, username: &str, ts: &str) -> PathBuf {
    unique_dir(backup_dir.join(format!("{PRESERVE_PREFIX}{username}_{ts}")))
}

/// Retained location for a client's full-directory snapshot
pub fn safety_snapshot_dir(backup_dir: &Path, username: &str, ts: &str) -> PathBuf {
    unique_dir(backup_dir.join(format!("{SAFETY_PREFIX}{username}_{ts}")))
}

/// Location of a fleet-wide session backup
pub fn session_backup_dir(backup_dir: &Path, ts: &str) -> PathBuf {
    unique_dir(backup_dir.join(format!("{SESSIONS_PREFIX}{ts}")))
}

/// Directory holding per-client lock files
pub fn locks_dir(backup_dir: &Path) -> PathBuf {
    backup_dir.join("locks")
}

/// Advisory lock file for one client
pub fn lock_path(backup_dir: &Path, username: &str) -> PathBuf {
    locks_dir(backup_dir).join(format!("{username}.lock"))
}

/// Append `-1`, `-2`, ... until the path is unused
fn unique_dir(base: PathBuf) -> PathBuf {
    if !base.exists() {
        return base;
    }

    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = base.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut n = 1u32;
    loop {
        let candidate = parent.join(format!("{name}-{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_timestamp_format() {
        let at = Local.with_ymd_and_hms(2026, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(timestamp(at), "20260309_070501");
    }

    #[test]
    fn test_snapshot_names() {
        let root = Path::new("/root/backups");
        assert_eq!(
            preserve_snapshot_dir(root, "alice", "20260309_070501"),
            PathBuf::from("/root/backups/temp_update_alice_20260309_070501")
        );
        assert_eq!(
            safety_snapshot_dir(root, "alice", "20260309_070501"),
            PathBuf::from("/root/backups/full_backup_alice_20260309_070501")
        );
        assert_eq!(
            lock_path(root, "alice"),
            PathBuf::from("/root/backups/locks/alice.lock")
        );
    }

    #[test]
    fn test_unique_suffix_on_collision() {
        let temp = TempDir::new().unwrap();
        let first = safety_snapshot_dir(temp.path(), "bob", "20260101_000000");
        std::fs::create_dir_all(&first).unwrap();

        let second = safety_snapshot_dir(temp.path(), "bob", "20260101_000000");
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "full_backup_bob_20260101_000000-1"
        );
    }
}
