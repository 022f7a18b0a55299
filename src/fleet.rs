// src/fleet.rs

//! Fleet-wide operations over the client registry
//!
//! Clients are always processed one after another. A fault in one client's
//! update (an `Err` or a panic) is recorded against that client and the
//! batch moves on to the next one.

use crate::backup::BackupWarning;
use crate::config::FleetConfig;
use crate::error::{panic_message, Error, Result};
use crate::paths;
use crate::pipeline::{PipelineOptions, UpdatePipeline, UpdateReport};
use crate::progress::ProgressTracker;
use crate::registry::Registry;
use crate::version::{HttpManifestReader, Version, VersionResolver, VersionStatus};
use chrono::Local;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Registry file name inside a session backup
const REGISTRY_COPY: &str = "clients.json";

/// Result of one client within a fleet update
#[derive(Debug, Clone)]
pub enum ClientRun {
    /// The pipeline ran to completion (whatever its outcome)
    Completed(UpdateReport),
    /// The pipeline returned an error or panicked
    Faulted { username: String, error: String },
}

impl ClientRun {
    pub fn username(&self) -> &str {
        match self {
            Self::Completed(report) => &report.username,
            Self::Faulted { username, .. } => username,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Completed(report) if report.success())
    }
}

/// Aggregate result of `update_all`
#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    pub succeeded: usize,
    pub failed: usize,
    pub per_client: Vec<ClientRun>,
    /// Set when persisting supervisor state after the batch failed
    pub persist_warning: Option<String>,
}

/// Version comparison for one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientVersionReport {
    pub username: String,
    pub local_version: Version,
    pub remote_version: Version,
    pub status: VersionStatus,
}

/// Result of `check_updates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub remote_version: Version,
    pub clients: Vec<ClientVersionReport>,
}

/// Result of a fleet-wide session backup
#[derive(Debug, Clone, Default)]
pub struct SessionBackupReport {
    pub location: PathBuf,
    /// Items copied per client, in registry order
    pub per_client: Vec<(String, Vec<String>)>,
    pub registry_copied: bool,
    pub warnings: Vec<BackupWarning>,
}

/// Runs pipelines and version checks across the registry
#[derive(Clone)]
pub struct FleetOrchestrator {
    pipeline: UpdatePipeline,
    versions: VersionResolver,
    progress: Option<Arc<dyn ProgressTracker>>,
}

impl FleetOrchestrator {
    pub fn new(pipeline: UpdatePipeline, versions: VersionResolver) -> Self {
        Self {
            pipeline,
            versions,
            progress: None,
        }
    }

    /// Wire the production collaborators from configuration
    pub fn from_config(config: &FleetConfig) -> Result<Self> {
        let reader = HttpManifestReader::new(config.timeouts.manifest())?;
        let versions = VersionResolver::new(Arc::new(reader), config.branches.clone());
        Ok(Self::new(UpdatePipeline::from_config(config), versions))
    }

    /// Report per-stage messages and per-client completion to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.pipeline = self.pipeline.with_options(PipelineOptions {
            progress: Some(progress.clone()),
        });
        self.progress = Some(progress);
        self
    }

    pub fn pipeline(&self) -> &UpdatePipeline {
        &self.pipeline
    }

    pub fn versions(&self) -> &VersionResolver {
        &self.versions
    }

    /// Update every registered client in registry order
    pub fn update_all(&self, registry: &Registry) -> FleetReport {
        let mut report = FleetReport::default();
        if let Some(progress) = &self.progress {
            progress.set_length(registry.len() as u64);
        }

        for client in &registry.clients {
            let run = match panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.update(client)))
            {
                Ok(Ok(update)) => ClientRun::Completed(update),
                Ok(Err(e)) => {
                    error!("Update of {} failed: {}", client.username, e);
                    ClientRun::Faulted {
                        username: client.username.clone(),
                        error: e.to_string(),
                    }
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Update of {} panicked: {}", client.username, message);
                    ClientRun::Faulted {
                        username: client.username.clone(),
                        error: format!("panicked: {message}"),
                    }
                }
            };

            if run.succeeded() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            if let Some(progress) = &self.progress {
                progress.increment(1);
            }
            report.per_client.push(run);
        }

        if !registry.is_empty()
            && let Err(e) = self.pipeline.supervisor().persist()
        {
            warn!("Could not persist supervisor state: {}", e);
            report.persist_warning = Some(e.to_string());
        }

        info!(
            "Fleet update finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        report
    }

    /// Update a single client by username
    pub fn update_one(&self, registry: &Registry, username: &str) -> Result<UpdateReport> {
        let client = registry
            .find(username)
            .ok_or_else(|| Error::UnknownClient(username.to_string()))?;
        self.pipeline.update(client)
    }

    /// Compare every client's local version with the source's version
    pub fn check_updates(&self, registry: &Registry) -> UpdateCheck {
        let remote_version = self.versions.remote_version(self.pipeline.source_url());
        let clients = registry
            .clients
            .iter()
            .map(|client| {
                let local_version = self.versions.local_version(&client.directory);
                ClientVersionReport {
                    username: client.username.clone(),
                    status: VersionStatus::of(&local_version, &remote_version),
                    local_version,
                    remote_version: remote_version.clone(),
                }
            })
            .collect();

        UpdateCheck {
            remote_version,
            clients,
        }
    }

    /// Clients that are out of date or whose status cannot be confirmed
    pub fn update_candidates(check: &UpdateCheck) -> Vec<&ClientVersionReport> {
        check
            .clients
            .iter()
            .filter(|c| c.status.is_update_candidate())
            .collect()
    }

    /// Copy every client's preserved files and the registry document into
    /// a timestamped directory under the backup root
    pub fn backup_sessions(
        &self,
        registry: &Registry,
        registry_path: &Path,
    ) -> Result<SessionBackupReport> {
        let backup = self.pipeline.backup();
        let ts = paths::timestamp(Local::now());
        let location = paths::session_backup_dir(backup.backup_dir(), &ts);
        fs::create_dir_all(&location)?;
        info!("Backing up sessions to {}", location.display());

        let mut report = SessionBackupReport {
            location: location.clone(),
            ..Default::default()
        };

        for client in &registry.clients {
            if !client.directory.is_dir() {
                warn!(
                    "Skipping {}: directory {} does not exist",
                    client.username,
                    client.directory.display()
                );
                report.per_client.push((client.username.clone(), Vec::new()));
                continue;
            }

            let staged =
                backup.stage_preserve(&client.directory, &location.join(&client.username))?;
            report.warnings.extend(staged.warnings);
            report.per_client.push((client.username.clone(), staged.items));
        }

        if registry_path.is_file() {
            fs::copy(registry_path, location.join(REGISTRY_COPY))?;
            report.registry_copied = true;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_run_success() {
        let faulted = ClientRun::Faulted {
            username: "bob".to_string(),
            error: "boom".to_string(),
        };
        assert!(!faulted.succeeded());
        assert_eq!(faulted.username(), "bob");
    }
}
