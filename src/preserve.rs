// src/preserve.rs

//! Stateful paths that must survive a client update
//!
//! Entries are relative to a client directory and may name a file or a
//! directory. An entry that does not exist in a given client is simply
//! skipped by the backup engine.

/// Paths kept across updates unless configuration says otherwise
pub const DEFAULT_PRESERVE_ITEMS: &[&str] = &[
    "session",
    "auth_info",
    "auth_info_baileys",
    ".wwebjs_auth",
    "creds.json",
    "config.js",
    "config.json",
    ".env",
    "database",
    "database.json",
    "data",
    "store",
    "baileys_store.json",
    "baileys_store_multi.json",
    "sessions",
    "temp",
];

/// Ordered list of relative paths treated as client state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservationSet {
    items: Vec<String>,
}

impl PreservationSet {
    /// Build a set from an ordered list, dropping repeated entries
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for item in items {
            let item = item.into();
            if !unique.contains(&item) {
                unique.push(item);
            }
        }
        Self { items: unique }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for PreservationSet {
    fn default() -> Self {
        Self::new(DEFAULT_PRESERVE_ITEMS.iter().copied())
    }
}
