// src/external/process.rs

//! Bounded execution of external programs
//!
//! Every git, npm and pm2 call goes through [`CommandRunner`]:
//!
//! - stdin is nulled so a prompting tool cannot hang the pipeline
//! - stdout/stderr are captured into anonymous temp files, which avoids the
//!   pipe-buffer deadlock of waiting on a chatty child
//! - the child runs in its own process group, and the whole group is killed
//!   once the configured timeout expires, so helpers spawned by git or npm
//!   cannot keep writing into a client directory that is being rolled back

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs commands with a wall-clock limit
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run to completion or until the timeout, whichever comes first
    pub fn run(&self, command: &mut Command) -> Result<CommandOutput> {
        let program = command.get_program().to_string_lossy().into_owned();

        let mut stdout_file = tempfile::tempfile()?;
        let mut stderr_file = tempfile::tempfile()?;

        debug!("Running {:?} (timeout {}s)", command, self.timeout.as_secs());

        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()
            .map_err(|e| Error::Command(format!("Failed to spawn {}: {}", program, e)))?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let stdout = read_captured(&mut stdout_file)?;
                let stderr = read_captured(&mut stderr_file)?;

                for line in stdout.lines() {
                    debug!("[{}] {}", program, line);
                }

                Ok(CommandOutput {
                    status,
                    stdout,
                    stderr,
                })
            }
            None => {
                warn!(
                    "{} exceeded {} seconds, killing it",
                    program,
                    self.timeout.as_secs()
                );
                kill_group(&mut child);
                Err(Error::Timeout {
                    program,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Like [`run`](Self::run), but a non-zero exit becomes an error
    pub fn run_checked(&self, command: &mut Command) -> Result<CommandOutput> {
        let program = command.get_program().to_string_lossy().into_owned();
        let output = self.run(command)?;

        if output.success() {
            return Ok(output);
        }

        for line in output.stderr.lines() {
            warn!("[{}] {}", program, line);
        }
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(Error::Command(format!(
            "{} exited with {}{}",
            program,
            code,
            last_line(&output.stderr)
                .map(|l| format!(": {l}"))
                .unwrap_or_default()
        )))
    }
}

/// Kill the child together with everything it spawned
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own group, so its pid is the group id
    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        debug!("killpg failed ({}), killing the child only", e);
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn read_captured(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let output = runner
            .run(Command::new("sh").args(["-c", "echo out; echo err >&2"]))
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_non_zero_exit_checked() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let result = runner.run_checked(Command::new("sh").args(["-c", "echo boom >&2; exit 3"]));

        match result {
            Err(Error::Command(msg)) => {
                assert!(msg.contains("exited with 3"), "{msg}");
                assert!(msg.contains("boom"), "{msg}");
            }
            other => panic!("expected command error, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_child() {
        let runner = CommandRunner::new(Duration::from_millis(200));
        let result = runner.run(Command::new("sleep").arg("5"));
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_timeout_kills_grandchildren() {
        let temp = tempfile::TempDir::new().unwrap();
        let marker = temp.path().join("late-write");
        let script = format!("(sleep 1; touch '{}') & sleep 5", marker.display());

        let runner = CommandRunner::new(Duration::from_millis(200));
        let result = runner.run(Command::new("sh").args(["-c", &script]));
        assert!(matches!(result, Err(Error::Timeout { .. })));

        std::thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "background helper survived the timeout");
    }

    #[test]
    fn test_missing_program() {
        let runner = CommandRunner::new(Duration::from_secs(1));
        let result = runner.run(&mut Command::new("/nonexistent/program"));
        assert!(matches!(result, Err(Error::Command(_))));
    }
}
