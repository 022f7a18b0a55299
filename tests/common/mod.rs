// tests/common/mod.rs

//! Shared test utilities: in-memory collaborators and fixture helpers.

#![allow(dead_code)]

use botfleet::{
    BackupEngine, Client, ClientControl, Error, FleetOrchestrator, PackageInstaller, PreservationSet,
    ProcessStatus, ProcessSupervisor, RemoteManifestReader, Result, SourceFetcher, UpdatePipeline,
    Version, VersionResolver,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const SOURCE_URL: &str = "https://github.com/example/bot.git";

/// Version every successful fake fetch writes into package.json
pub const FRESH_VERSION: &str = "2.0.0";

/// Supervisor keeping process state in memory and logging every call
#[derive(Default)]
pub struct FakeSupervisor {
    statuses: Mutex<HashMap<String, ProcessStatus>>,
    calls: Mutex<Vec<String>>,
    failing_restarts: Mutex<HashSet<String>>,
    failing_starts: Mutex<HashSet<String>>,
}

impl FakeSupervisor {
    pub fn set_status(&self, name: &str, status: ProcessStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(name.to_string(), status);
    }

    pub fn status_of(&self, name: &str) -> ProcessStatus {
        self.status(name)
    }

    pub fn fail_restart(&self, name: &str) {
        self.failing_restarts.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_start(&self, name: &str) {
        self.failing_starts.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls naming this process
    pub fn calls_for(&self, name: &str) -> Vec<String> {
        let suffix = format!(" {name}");
        self.calls()
            .into_iter()
            .filter(|c| c.ends_with(&suffix))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProcessSupervisor for FakeSupervisor {
    fn status(&self, name: &str) -> ProcessStatus {
        self.statuses
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(ProcessStatus::Stopped)
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.record(format!("stop {name}"));
        self.set_status(name, ProcessStatus::Stopped);
        Ok(())
    }

    fn start(&self, name: &str, entrypoint: &Path, workdir: &Path) -> Result<()> {
        self.record(format!("start {name}"));
        if self.failing_starts.lock().unwrap().contains(name) {
            return Err(Error::Command("pm2 exited with 1: script not found".to_string()));
        }
        if !workdir.join(entrypoint).exists() {
            return Err(Error::Command(format!("no {}", entrypoint.display())));
        }
        self.set_status(name, ProcessStatus::Online);
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<()> {
        self.record(format!("restart {name}"));
        if self.failing_restarts.lock().unwrap().contains(name) {
            return Err(Error::Command(format!("pm2 exited with 1: process {name} not found")));
        }
        self.set_status(name, ProcessStatus::Online);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.record(format!("delete {name}"));
        self.statuses.lock().unwrap().remove(name);
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.record("persist".to_string());
        Ok(())
    }
}

/// Fetcher that writes a minimal fresh checkout
///
/// Behaviour is keyed by the destination directory name, which is the
/// client's username in every fixture.
#[derive(Default)]
pub struct FakeFetcher {
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn panic_for(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().unwrap().clone()
    }
}

impl SourceFetcher for FakeFetcher {
    fn fetch(&self, _source_url: &str, destination: &Path) -> Result<()> {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.fetched.lock().unwrap().push(destination.to_path_buf());

        let should_panic = self.panicking.lock().unwrap().contains(&name);
        if should_panic {
            panic!("fetcher crashed for {name}");
        }

        let should_fail = self.failing.lock().unwrap().contains(&name);
        if should_fail {
            // Leave a partial checkout behind like an interrupted clone
            fs::create_dir_all(destination)?;
            fs::write(destination.join("partial.pack"), "garbage")?;
            return Err(Error::Command(
                "git exited with 128: could not resolve host".to_string(),
            ));
        }

        fs::create_dir_all(destination.join("session"))?;
        fs::write(
            destination.join("package.json"),
            format!(r#"{{"name": "bot", "version": "{FRESH_VERSION}"}}"#),
        )?;
        fs::write(destination.join("index.js"), "console.log('fresh');\n")?;
        fs::write(destination.join("session/README"), "placeholder\n")?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeInstaller {
    calls: Mutex<Vec<PathBuf>>,
    fail: Mutex<bool>,
}

impl FakeInstaller {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl PackageInstaller for FakeInstaller {
    fn install(&self, workdir: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(workdir.to_path_buf());
        if *self.fail.lock().unwrap() {
            return Err(Error::Command("npm exited with 1: ERESOLVE".to_string()));
        }
        fs::create_dir_all(workdir.join("node_modules"))?;
        Ok(())
    }
}

/// Manifest reader answering with a fixed version, or failing
pub struct FakeManifestReader {
    pub version: Option<String>,
}

impl RemoteManifestReader for FakeManifestReader {
    fn read_version(&self, _source_url: &str, _branches: &[String]) -> Result<Version> {
        match &self.version {
            Some(v) => Ok(Version::new(v.clone())),
            None => Err(Error::Http("404 Not Found".to_string())),
        }
    }
}

/// Temp root with fake collaborators wired into pipelines
pub struct Harness {
    pub temp: TempDir,
    pub supervisor: Arc<FakeSupervisor>,
    pub fetcher: Arc<FakeFetcher>,
    pub installer: Arc<FakeInstaller>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            supervisor: Arc::new(FakeSupervisor::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            installer: Arc::new(FakeInstaller::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root().join("backups")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root().join("bot-manager/clients.json")
    }

    pub fn pipeline(&self) -> UpdatePipeline {
        UpdatePipeline::new(
            SOURCE_URL,
            BackupEngine::new(PreservationSet::default(), self.backup_dir()),
            self.supervisor.clone(),
            self.fetcher.clone(),
            self.installer.clone(),
        )
    }

    /// Process control over the fake supervisor, sharing the pipeline's locks
    pub fn control(&self) -> ClientControl {
        ClientControl::new(self.supervisor.clone(), self.backup_dir())
    }

    /// Orchestrator whose remote manifest reports `remote` (None: unreachable)
    pub fn orchestrator(&self, remote: Option<&str>) -> FleetOrchestrator {
        let reader = FakeManifestReader {
            version: remote.map(str::to_string),
        };
        let versions = VersionResolver::new(
            Arc::new(reader),
            vec!["main".to_string(), "master".to_string()],
        );
        FleetOrchestrator::new(self.pipeline(), versions)
    }

    /// Create a client directory with a package.json and extra files
    pub fn add_client(&self, name: &str, version: Option<&str>, files: &[(&str, &str)]) -> Client {
        let dir = self.root().join("clients").join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(version) = version {
            fs::write(
                dir.join("package.json"),
                format!(r#"{{"name": "bot", "version": "{version}"}}"#),
            )
            .unwrap();
        }
        fs::write(dir.join("index.js"), "console.log('old');\n").unwrap();
        for (path, content) in files {
            let target = dir.join(path);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(target, content).unwrap();
        }
        Client::new(name, dir)
    }
}

/// Relative path -> file content (`None` for directories) for a whole tree
pub fn tree(dir: &Path) -> BTreeMap<PathBuf, Option<Vec<u8>>> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = entry.path().strip_prefix(dir).unwrap().to_path_buf();
            let content = if entry.file_type().is_dir() {
                None
            } else {
                Some(fs::read(entry.path()).unwrap())
            };
            (relative, content)
        })
        .collect()
}

/// Names of the entries directly under the backup root, excluding locks
pub fn backup_entries(backup_dir: &Path) -> Vec<String> {
    if !backup_dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(backup_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != "locks")
        .collect();
    names.sort();
    names
}
