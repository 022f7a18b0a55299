// src/lib.rs

//! Botfleet: update and rollback for a fleet of bot clients
//!
//! Every client is a checkout of the same bot source code, running under a
//! process supervisor and holding its own session state. An update replaces
//! a client's code while carrying that state across.
//!
//! # Architecture
//!
//! - Registry: one JSON document listing every client
//! - Pipeline: per-client stop, back up, fetch, restore, install, restart
//! - Rollback: a full safety snapshot restores the client when fetching fails
//! - Fleet: sequential updates with per-client fault isolation
//! - Control: start, stop, restart and delete clients directly
//! - External tools (pm2, git, npm) sit behind traits and run with timeouts

pub mod backup;
pub mod config;
pub mod control;
mod error;
pub mod external;
pub mod fleet;
pub mod lock;
pub mod paths;
pub mod pipeline;
pub mod preserve;
pub mod progress;
pub mod registry;
pub mod version;

pub use backup::{BackupEngine, BackupWarning, SnapshotInfo, StageResult};
pub use config::{ConfigError, FleetConfig};
pub use control::{ClientControl, ControlAction, ControlReport, DeleteReport};
pub use error::{Error, Result};
pub use external::{PackageInstaller, ProcessStatus, ProcessSupervisor, SourceFetcher};
pub use fleet::{
    ClientRun, ClientVersionReport, FleetOrchestrator, FleetReport, SessionBackupReport,
    UpdateCheck,
};
pub use pipeline::{
    PipelineOptions, UpdateOutcome, UpdatePipeline, UpdateReport, UpdateStage, UpdateWarning,
};
pub use preserve::{PreservationSet, DEFAULT_PRESERVE_ITEMS};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use registry::{Client, ClientRegistry, Registry};
pub use version::{RemoteManifestReader, Version, VersionResolver, VersionStatus};
