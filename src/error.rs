// src/error.rs

//! Error types shared across the crate

use crate::config::ConfigError;
use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by fleet operations
#[derive(Error, Debug)]
pub enum Error {
    /// Client working directory is missing; nothing was touched
    #[error("Client '{username}' not found: directory {} does not exist", directory.display())]
    ClientNotFound { username: String, directory: PathBuf },

    /// No registry entry with this username
    #[error("Client '{0}' is not registered")]
    UnknownClient(String),

    /// Username or directory already registered
    #[error("Client already registered: {0}")]
    DuplicateClient(String),

    /// Username is not usable as a process name and path component
    #[error("Invalid username '{0}': use ASCII letters and digits only")]
    InvalidUsername(String),

    /// Another operator holds the lock for this client
    #[error("Client '{0}' is locked by another update")]
    ClientBusy(String),

    /// Registry document could not be read or written
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// External command failed to run or exited non-zero
    #[error("Command failed: {0}")]
    Command(String),

    /// External command exceeded its time budget and was killed
    #[error("{program} timed out after {seconds} seconds")]
    Timeout { program: String, seconds: u64 },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io) => Error::Io(io),
            None => Error::Io(std::io::Error::other("directory traversal loop detected")),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
