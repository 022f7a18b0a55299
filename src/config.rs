// src/config.rs

//! Fleet configuration
//!
//! Settings are read from a TOML file. Only `source_url` is mandatory;
//! everything else falls back to the layout the bot manager has always used.
//!
//! # Example fleet.toml
//!
//! ```toml
//! source_url = "https://github.com/example/bot.git"
//! entrypoint = "index.js"
//! branches = ["main", "master"]
//!
//! # Override the preservation list (optional)
//! preserve = ["session", "creds.json", ".env", "database"]
//!
//! [paths]
//! clients_dir = "/root/clients"
//! registry = "/root/bot-manager/clients.json"
//! backup_dir = "/root/backups"
//!
//! # Seconds before an external call is killed
//! [timeouts]
//! fetch = 600
//! install = 900
//! supervisor = 30
//! manifest = 10
//! ```

use crate::preserve::PreservationSet;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default location of the fleet configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/botfleet/fleet.toml";

/// Environment variable that overrides the configuration path
pub const CONFIG_ENV: &str = "BOTFLEET_CONFIG";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level fleet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Canonical source repository every client is refreshed from
    pub source_url: String,

    /// Script the supervisor starts inside a client directory
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Branch candidates for the remote manifest, tried in order
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,

    /// Paths that survive an update
    #[serde(default = "default_preserve")]
    pub preserve: Vec<String>,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_clients_dir")]
    pub clients_dir: PathBuf,

    #[serde(default = "default_registry")]
    pub registry: PathBuf,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            clients_dir: default_clients_dir(),
            registry: default_registry(),
            backup_dir: default_backup_dir(),
        }
    }
}

/// Upper bounds for external calls, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_fetch_timeout")]
    pub fetch: u64,

    #[serde(default = "default_install_timeout")]
    pub install: u64,

    #[serde(default = "default_supervisor_timeout")]
    pub supervisor: u64,

    #[serde(default = "default_manifest_timeout")]
    pub manifest: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch: default_fetch_timeout(),
            install: default_install_timeout(),
            supervisor: default_supervisor_timeout(),
            manifest: default_manifest_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch)
    }

    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install)
    }

    pub fn supervisor(&self) -> Duration {
        Duration::from_secs(self.supervisor)
    }

    pub fn manifest(&self) -> Duration {
        Duration::from_secs(self.manifest)
    }
}

fn default_entrypoint() -> String {
    "index.js".to_string()
}

fn default_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}

fn default_preserve() -> Vec<String> {
    PreservationSet::default().iter().map(str::to_string).collect()
}

fn default_clients_dir() -> PathBuf {
    PathBuf::from("/root/clients")
}

fn default_registry() -> PathBuf {
    PathBuf::from("/root/bot-manager/clients.json")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("/root/backups")
}

fn default_fetch_timeout() -> u64 {
    600
}

fn default_install_timeout() -> u64 {
    900
}

fn default_supervisor_timeout() -> u64 {
    30
}

fn default_manifest_timeout() -> u64 {
    10
}

impl FleetConfig {
    /// Build a configuration with defaults for everything but the source
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            entrypoint: default_entrypoint(),
            branches: default_branches(),
            preserve: default_preserve(),
            paths: PathsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source_url must not be empty".to_string()));
        }
        if self.entrypoint.trim().is_empty() {
            return Err(ConfigError::Invalid("entrypoint must not be empty".to_string()));
        }
        if self.branches.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one manifest branch is required".to_string(),
            ));
        }

        let t = &self.timeouts;
        if t.fetch == 0 || t.install == 0 || t.supervisor == 0 || t.manifest == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }

        for entry in &self.preserve {
            let path = Path::new(entry);
            let escapes = path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if entry.is_empty() || escapes {
                return Err(ConfigError::Invalid(format!(
                    "preserve entry '{}' must be a relative path inside the client directory",
                    entry
                )));
            }
        }

        Ok(())
    }

    /// The preservation set described by this configuration
    pub fn preservation_set(&self) -> PreservationSet {
        PreservationSet::new(self.preserve.clone())
    }
}
