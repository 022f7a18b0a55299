// src/pipeline/mod.rs

//! Per-client update pipeline
//!
//! One update runs through a fixed sequence of stages:
//!
//! ```text
//! CheckRunning -> StopIfRunning -> BackupPreserve -> SafetyBackup -> FetchFresh
//!     -> RestorePreserve -> InstallDeps -> RestartIfWasRunning -> Done
//!
//! FetchFresh (failed) -> Rollback -> Done
//! ```
//!
//! Only `FetchFresh` can branch. Everything after a successful fetch is
//! best-effort: failures become [`UpdateWarning`]s and the run still ends
//! as [`UpdateOutcome::Updated`]. A failed fetch restores the safety
//! snapshot and leaves the client stopped for the operator to inspect.
//!
//! The pipeline never returns `Err` once the client directory has been
//! touched. Errors are reserved for faults before any mutation, such as a
//! held client lock.

mod report;

pub use report::{UpdateOutcome, UpdateReport, UpdateStage, UpdateWarning};

use crate::backup::{BackupEngine, BackupWarning};
use crate::config::FleetConfig;
use crate::error::{panic_message, Error, Result};
use crate::external::{
    GitFetcher, NpmInstaller, PackageInstaller, Pm2Supervisor, ProcessSupervisor, SourceFetcher,
};
use crate::lock::ClientLock;
use crate::paths;
use crate::progress::ProgressTracker;
use crate::registry::Client;
use crate::version::{local_version, Version};
use chrono::Local;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default script started by the supervisor
pub const DEFAULT_ENTRYPOINT: &str = "index.js";

/// Optional hooks for a pipeline run
#[derive(Clone, Default)]
pub struct PipelineOptions {
    /// Receives one message per stage
    pub progress: Option<Arc<dyn ProgressTracker>>,
}

/// Stop, back up, replace, restore and restart a single client
#[derive(Clone)]
pub struct UpdatePipeline {
    source_url: String,
    entrypoint: PathBuf,
    backup: BackupEngine,
    supervisor: Arc<dyn ProcessSupervisor>,
    fetcher: Arc<dyn SourceFetcher>,
    installer: Arc<dyn PackageInstaller>,
    options: PipelineOptions,
}

impl UpdatePipeline {
    pub fn new(
        source_url: impl Into<String>,
        backup: BackupEngine,
        supervisor: Arc<dyn ProcessSupervisor>,
        fetcher: Arc<dyn SourceFetcher>,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            entrypoint: PathBuf::from(DEFAULT_ENTRYPOINT),
            backup,
            supervisor,
            fetcher,
            installer,
            options: PipelineOptions::default(),
        }
    }

    /// Build a pipeline driving pm2, git and npm as configured
    pub fn from_config(config: &FleetConfig) -> Self {
        let backup = BackupEngine::new(config.preservation_set(), &config.paths.backup_dir);
        Self::new(
            config.source_url.clone(),
            backup,
            Arc::new(Pm2Supervisor::new(config.timeouts.supervisor())),
            Arc::new(GitFetcher::new(config.timeouts.fetch())),
            Arc::new(NpmInstaller::new(config.timeouts.install())),
        )
        .with_entrypoint(&config.entrypoint)
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<PathBuf>) -> Self {
        self.entrypoint = entrypoint.into();
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn backup(&self) -> &BackupEngine {
        &self.backup
    }

    pub fn supervisor(&self) -> &Arc<dyn ProcessSupervisor> {
        &self.supervisor
    }

    /// Update one client to the code currently at the source URL
    pub fn update(&self, client: &Client) -> Result<UpdateReport> {
        let dir = client.directory.as_path();
        let name = client.username.as_str();

        if !dir.is_dir() {
            warn!("Client {} has no directory at {}", name, dir.display());
            let mut report = UpdateReport::new(name, Version::unknown());
            report.outcome = UpdateOutcome::ClientNotFound;
            return Ok(report);
        }

        let _lock = ClientLock::acquire(self.backup.backup_dir(), name)?;
        let mut run = Run::new(name, local_version(dir), self.options.progress.clone());
        info!(
            "Updating {} (currently {})",
            name, run.report.previous_version
        );

        run.enter(UpdateStage::CheckRunning);
        let status = self.supervisor.status(name);
        run.report.was_running = status.is_running();
        debug!("{} is {}", name, status);

        run.enter(UpdateStage::StopIfRunning);
        if run.report.was_running
            && let Err(e) = self.supervisor.stop(name)
        {
            warn!("Failed to stop {}: {}", name, e);
            run.warn(UpdateWarning::Supervisor {
                action: "stop".to_string(),
                reason: e.to_string(),
            });
        }

        let ts = paths::timestamp(Local::now());

        run.enter(UpdateStage::BackupPreserve);
        let preserve_dir = paths::preserve_snapshot_dir(self.backup.backup_dir(), name, &ts);
        let staged = match self.backup.stage_preserve(dir, &preserve_dir) {
            Ok(staged) => staged,
            Err(e) => {
                // Nothing destructive has happened yet; put the process back
                error!("Cannot stage preserved files for {}: {}", name, e);
                let _ = self.backup.discard(&preserve_dir);
                if run.report.was_running {
                    self.resume(name, dir, &mut run);
                }
                return Err(e);
            }
        };
        run.report.preserved = staged.items;
        run.backup_warnings(staged.warnings);

        run.enter(UpdateStage::SafetyBackup);
        let safety_dir = paths::safety_snapshot_dir(self.backup.backup_dir(), name, &ts);
        match self.backup.snapshot_full(dir, &safety_dir) {
            Ok(()) => run.report.safety_snapshot = Some(safety_dir),
            Err(e) => {
                warn!("No safety snapshot for {}, rollback unavailable: {}", name, e);
                run.warn(UpdateWarning::SafetySnapshot {
                    reason: e.to_string(),
                });
            }
        }

        run.enter(UpdateStage::FetchFresh);
        let fetched = fs::remove_dir_all(dir)
            .map_err(Error::from)
            .and_then(|()| self.fetch_fresh(dir));

        if let Err(e) = fetched {
            warn!("Fetching fresh code for {} failed: {}", name, e);
            run.enter(UpdateStage::Rollback);
            let outcome = self.rollback(name, dir, run.report.safety_snapshot.as_deref(), &e);
            run.report.outcome = outcome;
            run.report.new_version = local_version(dir);

            run.enter(UpdateStage::Done);
            if run.report.is_corrupted() {
                error!(
                    "Preserved files of {} kept at {}",
                    name,
                    preserve_dir.display()
                );
                run.report.retained_preserve = Some(preserve_dir);
            } else {
                self.cleanup(&preserve_dir, &mut run);
            }
            if run.report.was_running {
                warn!("{} was left stopped; start it manually once fixed", name);
            }
            return Ok(run.finish());
        }

        run.enter(UpdateStage::RestorePreserve);
        let restored = self.backup.restore_preserve(&preserve_dir, dir);
        run.report.restored = restored.items;
        run.backup_warnings(restored.warnings);

        run.enter(UpdateStage::InstallDeps);
        if let Err(e) = self.installer.install(dir) {
            warn!("Dependency install for {} failed: {}", name, e);
            run.warn(UpdateWarning::Install {
                reason: e.to_string(),
            });
        }

        run.enter(UpdateStage::RestartIfWasRunning);
        if run.report.was_running {
            self.resume(name, dir, &mut run);
        }
        run.report.new_version = local_version(dir);

        run.enter(UpdateStage::Done);
        self.cleanup(&preserve_dir, &mut run);

        info!(
            "Updated {}: {} -> {}",
            name, run.report.previous_version, run.report.new_version
        );
        Ok(run.finish())
    }

    /// Run the fetcher; a panic counts as a failed fetch
    fn fetch_fresh(&self, dir: &Path) -> Result<()> {
        panic::catch_unwind(AssertUnwindSafe(|| self.fetcher.fetch(&self.source_url, dir)))
            .unwrap_or_else(|payload| {
                Err(Error::Command(format!(
                    "fetcher panicked: {}",
                    panic_message(payload.as_ref())
                )))
            })
    }

    /// Restore the safety snapshot after a failed fetch
    fn rollback(
        &self,
        name: &str,
        dir: &Path,
        snapshot: Option<&Path>,
        cause: &Error,
    ) -> UpdateOutcome {
        let Some(snapshot) = snapshot else {
            error!(
                "{} is CORRUPTED: fetch failed and no safety snapshot exists",
                name
            );
            return UpdateOutcome::Corrupted {
                reason: format!("{cause}; no safety snapshot to restore"),
            };
        };

        match self.backup.restore_full(snapshot, dir) {
            Ok(()) => {
                info!("Rolled back {} from {}", name, snapshot.display());
                UpdateOutcome::Recovered {
                    reason: cause.to_string(),
                }
            }
            Err(e) => {
                error!(
                    "{} is CORRUPTED: rollback from {} failed: {}",
                    name,
                    snapshot.display(),
                    e
                );
                UpdateOutcome::Corrupted {
                    reason: format!("{cause}; rollback failed: {e}"),
                }
            }
        }
    }

    /// Bring a previously running client back and persist the process list
    fn resume(&self, name: &str, dir: &Path, run: &mut Run) {
        let started = match self.supervisor.restart(name) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Restart of {} failed ({}), starting fresh", name, e);
                self.supervisor.start(name, &self.entrypoint, dir)
            }
        };

        if let Err(e) = started {
            warn!("Could not restart {}: {}", name, e);
            run.warn(UpdateWarning::Supervisor {
                action: "restart".to_string(),
                reason: e.to_string(),
            });
            return;
        }

        if let Err(e) = self.supervisor.persist() {
            warn!("Could not persist process list: {}", e);
            run.warn(UpdateWarning::Supervisor {
                action: "persist".to_string(),
                reason: e.to_string(),
            });
        }
    }

    fn cleanup(&self, preserve_dir: &Path, run: &mut Run) {
        if let Err(e) = self.backup.discard(preserve_dir) {
            warn!("Could not remove {}: {}", preserve_dir.display(), e);
            run.warn(UpdateWarning::Cleanup {
                reason: format!("{}: {}", preserve_dir.display(), e),
            });
        }
    }
}

/// Report under construction plus the progress sink
struct Run {
    report: UpdateReport,
    progress: Option<Arc<dyn ProgressTracker>>,
}

impl Run {
    fn new(
        username: &str,
        previous_version: Version,
        progress: Option<Arc<dyn ProgressTracker>>,
    ) -> Self {
        Self {
            report: UpdateReport::new(username, previous_version),
            progress,
        }
    }

    fn enter(&mut self, stage: UpdateStage) {
        debug!("{}: {}", self.report.username, stage);
        if let Some(progress) = &self.progress {
            progress.set_message(&format!("{}: {}", self.report.username, stage));
        }
        self.report.stages.push(stage);
    }

    fn warn(&mut self, warning: UpdateWarning) {
        self.report.warnings.push(warning);
    }

    fn backup_warnings(&mut self, warnings: Vec<BackupWarning>) {
        self.report
            .warnings
            .extend(warnings.into_iter().map(UpdateWarning::Backup));
    }

    fn finish(self) -> UpdateReport {
        self.report
    }
}
