// src/external/npm.rs

//! Dependency installer backed by `npm install`

use super::process::CommandRunner;
use super::PackageInstaller;
use crate::error::Result;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NpmInstaller {
    runner: CommandRunner,
    program: String,
}

impl NpmInstaller {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(timeout),
            program: "npm".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl PackageInstaller for NpmInstaller {
    fn install(&self, workdir: &Path) -> Result<()> {
        info!("Installing dependencies in {}", workdir.display());
        self.runner
            .run_checked(Command::new(&self.program).arg("install").current_dir(workdir))?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_runs_in_workdir() {
        let temp = TempDir::new().unwrap();
        // `touch install` stands in for npm: it creates ./install in the cwd
        let installer = NpmInstaller::new(Duration::from_secs(5)).with_program("touch");
        installer.install(temp.path()).unwrap();
        assert!(temp.path().join("install").exists());
    }
}
