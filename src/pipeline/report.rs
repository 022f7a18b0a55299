// src/pipeline/report.rs

//! Per-client update results

use crate::backup::BackupWarning;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stages of one client update, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStage {
    CheckRunning,
    StopIfRunning,
    BackupPreserve,
    SafetyBackup,
    FetchFresh,
    RestorePreserve,
    InstallDeps,
    RestartIfWasRunning,
    /// Only entered when fetching fresh code failed
    Rollback,
    Done,
}

impl UpdateStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CheckRunning => "checking process status",
            Self::StopIfRunning => "stopping client",
            Self::BackupPreserve => "backing up session files",
            Self::SafetyBackup => "creating safety snapshot",
            Self::FetchFresh => "downloading latest version",
            Self::RestorePreserve => "restoring session files",
            Self::InstallDeps => "installing dependencies",
            Self::RestartIfWasRunning => "restarting client",
            Self::Rollback => "rolling back",
            Self::Done => "cleaning up",
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final state of a client update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// Fresh code in place with preserved state restored
    Updated,
    /// Fetch failed; the safety snapshot was restored
    Recovered { reason: String },
    /// Fetch failed and the directory could not be put back
    Corrupted { reason: String },
    /// The client directory did not exist; nothing was touched
    ClientNotFound,
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => write!(f, "updated"),
            Self::Recovered { reason } => write!(f, "recovered from failed update ({reason})"),
            Self::Corrupted { reason } => write!(f, "CORRUPTED ({reason})"),
            Self::ClientNotFound => write!(f, "client directory not found"),
        }
    }
}

/// Non-fatal problem recorded during an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateWarning {
    /// A preserved item could not be staged or restored
    Backup(BackupWarning),
    /// No safety snapshot was taken; rollback is unavailable for this run
    SafetySnapshot { reason: String },
    /// Dependency installation failed or timed out
    Install { reason: String },
    /// A supervisor call failed
    Supervisor { action: String, reason: String },
    /// The ephemeral preserve snapshot could not be removed
    Cleanup { reason: String },
}

impl fmt::Display for UpdateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup(w) => write!(f, "backup: {w}"),
            Self::SafetySnapshot { reason } => {
                write!(f, "safety snapshot failed, rollback disabled: {reason}")
            }
            Self::Install { reason } => write!(f, "dependency install: {reason}"),
            Self::Supervisor { action, reason } => write!(f, "supervisor {action}: {reason}"),
            Self::Cleanup { reason } => write!(f, "cleanup: {reason}"),
        }
    }
}

/// Everything the pipeline learned while updating one client
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub username: String,
    pub outcome: UpdateOutcome,
    pub previous_version: Version,
    pub new_version: Version,
    pub warnings: Vec<UpdateWarning>,
    /// Stages entered, in order
    pub stages: Vec<UpdateStage>,
    /// Preserved items found before the fetch
    pub preserved: Vec<String>,
    /// Preserved items put back after the fetch
    pub restored: Vec<String>,
    /// Retained full snapshot, if one was taken
    pub safety_snapshot: Option<PathBuf>,
    /// Preserve snapshot kept because the client directory was lost
    pub retained_preserve: Option<PathBuf>,
    /// Whether the supervisor reported the client online at the start
    pub was_running: bool,
}

impl UpdateReport {
    pub(crate) fn new(username: &str, previous_version: Version) -> Self {
        Self {
            username: username.to_string(),
            outcome: UpdateOutcome::Updated,
            new_version: previous_version.clone(),
            previous_version,
            warnings: Vec::new(),
            stages: Vec::new(),
            preserved: Vec::new(),
            restored: Vec::new(),
            safety_snapshot: None,
            retained_preserve: None,
            was_running: false,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Corrupted { .. })
    }
}
