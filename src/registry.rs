// src/registry.rs

//! Durable list of registered clients
//!
//! The registry is a single JSON document:
//!
//! ```json
//! {
//!   "clients": [
//!     {"username": "alice", "directory": "/root/clients/alice", "created_at": "2026-01-04T10:22:31.512"}
//!   ]
//! }
//! ```
//!
//! Writes go to a temp file in the same directory which is then renamed over
//! the document, so readers never observe a partial write.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A registered bot instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identity, also the supervisor process name
    pub username: String,
    /// Working directory holding the client's code and state
    pub directory: PathBuf,
    pub created_at: NaiveDateTime,
}

impl Client {
    pub fn new(username: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            directory: directory.into(),
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

/// Ordered collection of clients with unique usernames
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client
    ///
    /// Usernames must be ASCII alphanumeric and unique, and no two clients
    /// may share a directory.
    pub fn add(&mut self, client: Client) -> Result<()> {
        if client.username.is_empty()
            || !client.username.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::InvalidUsername(client.username));
        }
        if self.find(&client.username).is_some() {
            return Err(Error::DuplicateClient(client.username));
        }
        if let Some(owner) = self.clients.iter().find(|c| c.directory == client.directory) {
            return Err(Error::DuplicateClient(format!(
                "directory {} already belongs to '{}'",
                client.directory.display(),
                owner.username
            )));
        }

        self.clients.push(client);
        Ok(())
    }

    /// Drop the client with this username; returns whether one was removed
    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| c.username != username);
        self.clients.len() != before
    }

    pub fn find(&self, username: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.username == username)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Loads and saves the registry document at a fixed path
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    path: PathBuf,
}

impl ClientRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the registry; a missing document is an empty registry
    ///
    /// Entries are re-registered one by one, so a hand-edited document with
    /// duplicate or unusable usernames is rejected as a whole.
    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            debug!("No registry at {}, starting empty", self.path.display());
            return Ok(Registry::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let document: Registry = serde_json::from_str(&content).map_err(|e| {
            Error::Registry(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;

        let mut registry = Registry::new();
        for client in document.clients {
            registry.add(client).map_err(|e| {
                Error::Registry(format!("Invalid entry in {}: {}", self.path.display(), e))
            })?;
        }
        Ok(registry)
    }

    /// Persist the registry atomically (write temp file, fsync, rename)
    pub fn save(&self, registry: &Registry) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut temp, registry)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| {
            Error::Registry(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!("Saved {} client(s) to {}", registry.len(), self.path.display());
        Ok(())
    }

    /// Load, register a client, save
    pub fn add(&self, client: Client) -> Result<Registry> {
        let mut registry = self.load()?;
        registry.add(client)?;
        self.save(&registry)?;
        Ok(registry)
    }

    /// Load, drop a client by username, save
    pub fn remove(&self, username: &str) -> Result<Registry> {
        let mut registry = self.load()?;
        if registry.remove(username) {
            self.save(&registry)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn client(name: &str) -> Client {
        Client::new(name, format!("/root/clients/{name}"))
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ClientRegistry::new(temp.path().join("clients.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = ClientRegistry::new(temp.path().join("nested/clients.json"));

        let mut registry = Registry::new();
        registry.add(client("alice")).unwrap();
        registry.add(client("bob")).unwrap();
        store.save(&registry).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.clients[0].username, "alice");
        assert_eq!(loaded.clients[1].username, "bob");

        // No temp files left beside the document
        let entries: Vec<_> = std::fs::read_dir(temp.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_reads_existing_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("clients.json");
        std::fs::write(
            &path,
            r#"{"clients": [{"username": "carol", "directory": "/root/clients/carol", "created_at": "2025-11-02T09:15:42.118273"}]}"#,
        )
        .unwrap();

        let registry = ClientRegistry::new(&path).load().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.clients[0].directory, PathBuf::from("/root/clients/carol"));
        assert_eq!(
            registry.clients[0].created_at.date().to_string(),
            "2025-11-02"
        );
    }

    #[test]
    fn test_malformed_document_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("clients.json");
        std::fs::write(&path, "{\"clients\": [").unwrap();

        let result = ClientRegistry::new(&path).load();
        assert!(matches!(result, Err(Error::Registry(_))));
    }

    #[test]
    fn test_load_rejects_invalid_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("clients.json");
        let entry = |name: &str, dir: &str| {
            format!(
                r#"{{"username": "{name}", "directory": "{dir}", "created_at": "2025-11-02T09:15:42"}}"#
            )
        };

        let documents = [
            // same username twice
            vec![entry("a", "/root/clients/a"), entry("a", "/root/clients/a2")],
            // two clients sharing a directory
            vec![entry("a", "/root/clients/a"), entry("b", "/root/clients/a")],
            // username escaping the backup root
            vec![entry("a", "/root/clients/a"), entry("../../evil", "/root/clients/evil")],
            vec![entry("", "/root/clients/empty")],
        ];
        for clients in documents {
            std::fs::write(&path, format!(r#"{{"clients": [{}]}}"#, clients.join(","))).unwrap();
            let result = ClientRegistry::new(&path).load();
            assert!(matches!(result, Err(Error::Registry(_))), "{result:?}");
        }
    }

    #[test]
    fn test_add_enforces_uniqueness() {
        let mut registry = Registry::new();
        registry.add(client("alice")).unwrap();

        assert!(matches!(
            registry.add(client("alice")),
            Err(Error::DuplicateClient(_))
        ));

        let same_dir = Client::new("other", "/root/clients/alice");
        assert!(matches!(
            registry.add(same_dir),
            Err(Error::DuplicateClient(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_add_rejects_bad_usernames() {
        let mut registry = Registry::new();
        for bad in ["", "has space", "../up", "dash-name"] {
            assert!(matches!(
                registry.add(Client::new(bad, "/tmp/x")),
                Err(Error::InvalidUsername(_))
            ));
        }
    }

    #[test]
    fn test_remove_is_filter() {
        let temp = TempDir::new().unwrap();
        let store = ClientRegistry::new(temp.path().join("clients.json"));
        store.add(client("alice")).unwrap();
        store.add(client("bob")).unwrap();

        let after = store.remove("alice").unwrap();
        assert!(after.find("alice").is_none());
        assert!(after.find("bob").is_some());

        let unchanged = store.remove("nobody").unwrap();
        assert_eq!(unchanged.len(), 1);
    }
}
