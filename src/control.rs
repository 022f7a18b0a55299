// src/control.rs

//! Direct process control of registered clients
//!
//! Start, stop and restart go straight to the supervisor. The fleet-wide
//! variants walk the registry in order; a failing client is recorded and
//! the walk moves on.

use crate::config::FleetConfig;
use crate::error::{Error, Result};
use crate::external::{Pm2Supervisor, ProcessStatus, ProcessSupervisor};
use crate::lock::ClientLock;
use crate::pipeline::DEFAULT_ENTRYPOINT;
use crate::registry::{Client, ClientRegistry, Registry};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// What a fleet-wide start or stop did to one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Started,
    AlreadyRunning,
    Stopped,
    AlreadyStopped,
    Failed(String),
}

impl ControlAction {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::Stopped => write!(f, "stopped"),
            Self::AlreadyStopped => write!(f, "already stopped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-client results of `start_all` or `stop_all`
#[derive(Debug, Clone, Default)]
pub struct ControlReport {
    pub per_client: Vec<(String, ControlAction)>,
    pub persist_warning: Option<String>,
}

impl ControlReport {
    pub fn failed(&self) -> usize {
        self.per_client
            .iter()
            .filter(|(_, action)| action.is_failure())
            .count()
    }
}

/// Result of removing a client from the fleet
#[derive(Debug, Clone)]
pub struct DeleteReport {
    pub username: String,
    pub directory: PathBuf,
    /// False when the directory was already gone
    pub directory_removed: bool,
    pub warnings: Vec<String>,
}

/// Starts, stops and removes clients through the process supervisor
#[derive(Clone)]
pub struct ClientControl {
    supervisor: Arc<dyn ProcessSupervisor>,
    entrypoint: PathBuf,
    backup_dir: PathBuf,
}

impl ClientControl {
    /// `backup_dir` holds the per-client locks shared with updates
    pub fn new(supervisor: Arc<dyn ProcessSupervisor>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            entrypoint: PathBuf::from(DEFAULT_ENTRYPOINT),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(
            Arc::new(Pm2Supervisor::new(config.timeouts.supervisor())),
            &config.paths.backup_dir,
        )
        .with_entrypoint(&config.entrypoint)
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<PathBuf>) -> Self {
        self.entrypoint = entrypoint.into();
        self
    }

    pub fn supervisor(&self) -> &Arc<dyn ProcessSupervisor> {
        &self.supervisor
    }

    /// Start a client and save the supervisor's process list
    pub fn start(&self, client: &Client) -> Result<()> {
        self.launch(client)?;
        if let Err(e) = self.supervisor.persist() {
            warn!("Could not persist process list: {}", e);
        }
        Ok(())
    }

    pub fn stop(&self, client: &Client) -> Result<()> {
        self.supervisor.stop(&client.username)
    }

    pub fn restart(&self, client: &Client) -> Result<()> {
        self.supervisor.restart(&client.username)
    }

    /// Start every client that is not already online, then persist once
    pub fn start_all(&self, registry: &Registry) -> ControlReport {
        let mut report = ControlReport::default();

        for client in &registry.clients {
            let action = if self.supervisor.status(&client.username).is_running() {
                ControlAction::AlreadyRunning
            } else {
                match self.launch(client) {
                    Ok(()) => ControlAction::Started,
                    Err(e) => {
                        warn!("Could not start {}: {}", client.username, e);
                        ControlAction::Failed(e.to_string())
                    }
                }
            };
            report.per_client.push((client.username.clone(), action));
        }

        if !registry.is_empty()
            && let Err(e) = self.supervisor.persist()
        {
            warn!("Could not persist process list: {}", e);
            report.persist_warning = Some(e.to_string());
        }
        report
    }

    /// Stop every client the supervisor does not report as stopped
    pub fn stop_all(&self, registry: &Registry) -> ControlReport {
        let mut report = ControlReport::default();

        for client in &registry.clients {
            let action = if self.supervisor.status(&client.username) == ProcessStatus::Stopped {
                ControlAction::AlreadyStopped
            } else {
                match self.supervisor.stop(&client.username) {
                    Ok(()) => ControlAction::Stopped,
                    Err(e) => {
                        warn!("Could not stop {}: {}", client.username, e);
                        ControlAction::Failed(e.to_string())
                    }
                }
            };
            report.per_client.push((client.username.clone(), action));
        }
        report
    }

    /// Remove a client: its supervisor entry, its directory and its
    /// registry entry, in that order
    ///
    /// Supervisor failures are warnings. A directory that cannot be removed
    /// is an error and leaves the registry untouched.
    pub fn delete(&self, store: &ClientRegistry, username: &str) -> Result<DeleteReport> {
        let registry = store.load()?;
        let client = registry
            .find(username)
            .cloned()
            .ok_or_else(|| Error::UnknownClient(username.to_string()))?;
        let _lock = ClientLock::acquire(&self.backup_dir, username)?;

        let mut report = DeleteReport {
            username: client.username.clone(),
            directory: client.directory.clone(),
            directory_removed: false,
            warnings: Vec::new(),
        };

        if self.supervisor.status(username).is_running()
            && let Err(e) = self.supervisor.stop(username)
        {
            warn!("Could not stop {}: {}", username, e);
            report.warnings.push(format!("stop: {e}"));
        }
        if let Err(e) = self.supervisor.delete(username) {
            warn!("Could not remove {} from the supervisor: {}", username, e);
            report.warnings.push(format!("delete: {e}"));
        }

        if client.directory.exists() {
            fs::remove_dir_all(&client.directory)?;
            report.directory_removed = true;
        }

        store.remove(username)?;

        if let Err(e) = self.supervisor.persist() {
            warn!("Could not persist process list: {}", e);
            report.warnings.push(format!("persist: {e}"));
        }

        info!("Deleted client {}", username);
        Ok(report)
    }

    fn launch(&self, client: &Client) -> Result<()> {
        if !client.directory.is_dir() {
            return Err(Error::ClientNotFound {
                username: client.username.clone(),
                directory: client.directory.clone(),
            });
        }
        self.supervisor
            .start(&client.username, &self.entrypoint, &client.directory)
    }
}
