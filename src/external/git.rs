// src/external/git.rs

//! Source fetcher backed by `git clone`

use super::process::CommandRunner;
use super::SourceFetcher;
use crate::error::Result;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::info;

/// Clones the source repository with the `git` binary
#[derive(Debug, Clone)]
pub struct GitFetcher {
    runner: CommandRunner,
    program: String,
}

impl GitFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(timeout),
            program: "git".to_string(),
        }
    }

    /// Use a different git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl SourceFetcher for GitFetcher {
    fn fetch(&self, source_url: &str, destination: &Path) -> Result<()> {
        info!("Cloning {} into {}", source_url, destination.display());
        self.runner.run_checked(
            Command::new(&self.program)
                .arg("clone")
                .arg(source_url)
                .arg(destination),
        )?;
        Ok(())
    }
}
