// src/external/pm2.rs

//! Process supervisor backed by the pm2 command-line tool

use super::process::CommandRunner;
use super::{ProcessStatus, ProcessSupervisor};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One entry of `pm2 jlist`
#[derive(Debug, Deserialize)]
struct Pm2Process {
    name: Option<String>,
    #[serde(default)]
    pm2_env: Option<Pm2Env>,
}

#[derive(Debug, Deserialize)]
struct Pm2Env {
    status: Option<String>,
}

/// Look up a process by name in `pm2 jlist` output
///
/// A process missing from a well-formed list is `Stopped`; output that is
/// not a JSON process list is `Unknown`.
pub fn parse_process_list(output: &str, name: &str) -> ProcessStatus {
    // pm2 may print update notices before the JSON array
    let json = match output.find('[') {
        Some(start) => &output[start..],
        None => return ProcessStatus::Unknown,
    };

    let processes: Vec<Pm2Process> = match serde_json::from_str(json.trim_end()) {
        Ok(list) => list,
        Err(e) => {
            debug!("Unreadable pm2 process list: {}", e);
            return ProcessStatus::Unknown;
        }
    };

    let status = processes
        .iter()
        .find(|p| p.name.as_deref() == Some(name))
        .and_then(|p| p.pm2_env.as_ref())
        .and_then(|env| env.status.as_deref());

    match status {
        Some("online") => ProcessStatus::Online,
        _ => ProcessStatus::Stopped,
    }
}

/// Drives client processes through pm2
#[derive(Debug, Clone)]
pub struct Pm2Supervisor {
    runner: CommandRunner,
    program: String,
}

impl Pm2Supervisor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: CommandRunner::new(timeout),
            program: "pm2".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn pm2(&self) -> Command {
        Command::new(&self.program)
    }

    /// Last `lines` lines of a process's log files, without following them
    pub fn logs(&self, name: &str, lines: usize) -> Result<String> {
        let output = self.runner.run_checked(
            self.pm2()
                .args(["logs", name, "--nostream", "--lines"])
                .arg(lines.to_string()),
        )?;
        Ok(output.stdout)
    }
}

impl ProcessSupervisor for Pm2Supervisor {
    fn status(&self, name: &str) -> ProcessStatus {
        match self.runner.run(self.pm2().arg("jlist")) {
            Ok(output) if output.success() => parse_process_list(&output.stdout, name),
            Ok(output) => {
                warn!("pm2 jlist exited with {}", output.status);
                ProcessStatus::Unknown
            }
            Err(e) => {
                warn!("Could not query pm2 for '{}': {}", name, e);
                ProcessStatus::Unknown
            }
        }
    }

    fn stop(&self, name: &str) -> Result<()> {
        info!("Stopping {}", name);
        self.runner.run_checked(self.pm2().args(["stop", name]))?;
        Ok(())
    }

    fn start(&self, name: &str, entrypoint: &Path, workdir: &Path) -> Result<()> {
        info!("Starting {} from {}", name, workdir.display());
        let script = workdir.join(entrypoint);
        if !script.exists() {
            return Err(Error::Command(format!(
                "entrypoint {} does not exist",
                script.display()
            )));
        }
        self.runner.run_checked(
            self.pm2()
                .arg("start")
                .arg(&script)
                .args(["--name", name])
                .arg("--cwd")
                .arg(workdir),
        )?;
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<()> {
        info!("Restarting {}", name);
        self.runner.run_checked(self.pm2().args(["restart", name]))?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        info!("Removing {} from pm2", name);
        self.runner.run_checked(self.pm2().args(["delete", name]))?;
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.runner.run_checked(self.pm2().arg("save"))?;
        Ok(())
    }
}
