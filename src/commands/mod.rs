// src/commands/mod.rs
//! Command handlers for the botfleet CLI

mod check;
mod control;
mod list;
mod sessions;
mod snapshots;
mod update;

pub use check::cmd_check;
pub use control::{
    cmd_delete, cmd_logs, cmd_restart, cmd_start, cmd_start_all, cmd_stop, cmd_stop_all,
};
pub use list::cmd_list;
pub use sessions::cmd_backup_sessions;
pub use snapshots::{cmd_snapshots_list, cmd_snapshots_prune};
pub use update::{cmd_update, cmd_update_all};

use anyhow::{Context as _, Result};
use botfleet::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use botfleet::{ClientRegistry, FleetConfig, Registry};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration and registry shared by every command
pub struct Context {
    pub config: FleetConfig,
    pub registry: ClientRegistry,
}

impl Context {
    /// Load configuration from `--config`, `$BOTFLEET_CONFIG` or the default path
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(explicit);
        debug!("Loading configuration from {}", path.display());

        let config = FleetConfig::load(&path)
            .with_context(|| format!("Cannot load configuration {}", path.display()))?;
        let registry = ClientRegistry::new(&config.paths.registry);
        Ok(Self { config, registry })
    }

    pub fn load_registry(&self) -> Result<Registry> {
        self.registry
            .load()
            .with_context(|| format!("Cannot read registry {}", self.registry.path().display()))
    }
}

/// Ask a question on the terminal and read one line of answer
pub(crate) fn prompt(question: &str) -> Result<String> {
    print!("{} ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Yes/no question; anything but "y" or "yes" is a no
pub(crate) fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [y/N]", question))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}
