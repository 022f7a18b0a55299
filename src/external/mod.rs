// src/external/mod.rs

//! Contracts for the tools the update pipeline drives
//!
//! The pipeline never shells out directly. It talks to three capabilities:
//!
//! - [`ProcessSupervisor`]: reports and controls whether a client runs (pm2)
//! - [`SourceFetcher`]: materializes a fresh copy of the canonical source (git)
//! - [`PackageInstaller`]: installs a client's dependencies (npm)
//!
//! Production implementations wrap the command-line tools through a
//! [`CommandRunner`] with bounded timeouts. Tests substitute in-memory fakes.

mod git;
mod npm;
mod pm2;
pub mod process;

pub use git::GitFetcher;
pub use npm::NpmInstaller;
pub use pm2::{parse_process_list, Pm2Supervisor};
pub use process::{CommandOutput, CommandRunner};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Run state of a client process as reported by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Online,
    Stopped,
    /// Supervisor unreachable or its answer unreadable
    Unknown,
}

impl ProcessStatus {
    /// Only a confirmed `Online` counts as running
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// External process manager
///
/// `status` never fails; control calls return errors that callers treat as
/// warnings.
pub trait ProcessSupervisor: Send + Sync {
    fn status(&self, name: &str) -> ProcessStatus;

    fn stop(&self, name: &str) -> Result<()>;

    fn start(&self, name: &str, entrypoint: &Path, workdir: &Path) -> Result<()>;

    fn restart(&self, name: &str) -> Result<()>;

    /// Forget the process entirely
    fn delete(&self, name: &str) -> Result<()>;

    /// Save the supervisor's process list so it survives a reboot
    fn persist(&self) -> Result<()>;
}

/// Produces a fresh copy of the canonical source at a path
pub trait SourceFetcher: Send + Sync {
    /// `destination` does not exist when this is called
    fn fetch(&self, source_url: &str, destination: &Path) -> Result<()>;
}

/// Installs dependencies inside a client directory
pub trait PackageInstaller: Send + Sync {
    fn install(&self, workdir: &Path) -> Result<()>;
}
