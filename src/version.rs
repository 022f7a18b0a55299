// src/version.rs

//! Client version resolution
//!
//! Versions are opaque strings. They are only ever compared for equality, and
//! any lookup that cannot produce a value degrades to the `unknown` sentinel
//! instead of failing. A comparison involving `unknown` is reported as
//! ambiguous so callers never mistake it for "up to date".

use crate::error::{Error, Result};
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Project manifest declaring the version
pub const MANIFEST_FILE: &str = "package.json";

/// Settings script consulted when the manifest has no version
pub const SETTINGS_FILE: &str = "settings.js";

const UNKNOWN: &str = "unknown";

/// Opaque version string with an `unknown` sentinel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Wrap a version string; blank input becomes `unknown`
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::unknown()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of comparing a local version with the remote one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    /// Both known and equal
    UpToDate,
    /// Both known and different
    UpdateAvailable,
    /// At least one side is unknown
    Ambiguous,
}

impl VersionStatus {
    pub fn of(local: &Version, remote: &Version) -> Self {
        if local.is_unknown() || remote.is_unknown() {
            Self::Ambiguous
        } else if local == remote {
            Self::UpToDate
        } else {
            Self::UpdateAvailable
        }
    }

    /// Whether a client in this state should be offered an update
    pub fn is_update_candidate(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::UpdateAvailable => write!(f, "update available"),
            Self::Ambiguous => write!(f, "unknown (check manually)"),
        }
    }
}

/// Reads the version declared in the canonical source's manifest
pub trait RemoteManifestReader: Send + Sync {
    /// Try each branch in order and return the first version found
    fn read_version(&self, source_url: &str, branches: &[String]) -> Result<Version>;
}

/// Fetches raw `package.json` files over HTTP
pub struct HttpManifestReader {
    client: Client,
}

impl HttpManifestReader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("botfleet/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn fetch_manifest(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(Error::Http(format!("{} returned {}", url, response.status())));
        }
        Ok(response.json()?)
    }
}

impl RemoteManifestReader for HttpManifestReader {
    fn read_version(&self, source_url: &str, branches: &[String]) -> Result<Version> {
        let mut last_error = None;

        for branch in branches {
            let url = raw_manifest_url(source_url, branch);
            debug!("Fetching remote manifest {}", url);

            match self.fetch_manifest(&url) {
                Ok(manifest) => return Ok(version_field(&manifest)),
                Err(e) => {
                    debug!("Manifest lookup on branch '{}' failed: {}", branch, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Http("no branch candidates".to_string())))
    }
}

/// Raw URL of the manifest on a branch of the source repository
pub fn raw_manifest_url(source_url: &str, branch: &str) -> String {
    let base = source_url.trim_end_matches('/');
    let base = base.strip_suffix(".git").unwrap_or(base);

    if let Some(rest) = base
        .strip_prefix("https://github.com/")
        .or_else(|| base.strip_prefix("http://github.com/"))
    {
        format!("https://raw.githubusercontent.com/{rest}/{branch}/{MANIFEST_FILE}")
    } else {
        format!("{base}/raw/{branch}/{MANIFEST_FILE}")
    }
}

fn version_field(manifest: &serde_json::Value) -> Version {
    manifest
        .get("version")
        .and_then(|v| v.as_str())
        .map(Version::new)
        .unwrap_or_else(Version::unknown)
}

/// Read the version a client directory declares
///
/// The manifest's `version` field wins; otherwise the settings script is
/// searched for a version assignment. Anything unreadable yields `unknown`.
pub fn local_version(directory: &Path) -> Version {
    if let Some(version) = manifest_version(&directory.join(MANIFEST_FILE)) {
        return version;
    }
    if let Some(version) = settings_version(&directory.join(SETTINGS_FILE)) {
        return version;
    }
    Version::unknown()
}

fn manifest_version(path: &Path) -> Option<Version> {
    let content = std::fs::read_to_string(path).ok()?;
    let manifest: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring unparsable manifest {}: {}", path.display(), e);
            return None;
        }
    };
    let version = version_field(&manifest);
    (!version.is_unknown()).then_some(version)
}

fn settings_version(path: &Path) -> Option<Version> {
    let content = std::fs::read_to_string(path).ok()?;
    let pattern = Regex::new(r#"version["']?\s*[:=]\s*["']([^"']+)["']"#).ok()?;
    let captures = pattern.captures(&content)?;
    let version = Version::new(captures.get(1)?.as_str());
    (!version.is_unknown()).then_some(version)
}

/// Resolves local and remote versions for the fleet
#[derive(Clone)]
pub struct VersionResolver {
    reader: Arc<dyn RemoteManifestReader>,
    branches: Vec<String>,
}

impl VersionResolver {
    pub fn new(reader: Arc<dyn RemoteManifestReader>, branches: Vec<String>) -> Self {
        Self { reader, branches }
    }

    pub fn local_version(&self, directory: &Path) -> Version {
        local_version(directory)
    }

    /// Version on the canonical source, or `unknown` when unreachable
    pub fn remote_version(&self, source_url: &str) -> Version {
        match self.reader.read_version(source_url, &self.branches) {
            Ok(version) => version,
            Err(e) => {
                warn!("Could not determine remote version of {}: {}", source_url, e);
                Version::unknown()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubReader {
        versions: Vec<(String, Version)>,
        asked: Mutex<Vec<String>>,
    }

    impl RemoteManifestReader for StubReader {
        fn read_version(&self, _source_url: &str, branches: &[String]) -> Result<Version> {
            for branch in branches {
                self.asked.lock().unwrap().push(branch.clone());
                if let Some((_, v)) = self.versions.iter().find(|(b, _)| b == branch) {
                    return Ok(v.clone());
                }
            }
            Err(Error::Http("404".to_string()))
        }
    }

    #[test]
    fn test_version_sentinel() {
        assert!(Version::new("").is_unknown());
        assert!(Version::new("  ").is_unknown());
        assert!(Version::unknown().is_unknown());
        assert_eq!(Version::new(" 1.2.0 ").as_str(), "1.2.0");
    }

    #[test]
    fn test_status_comparison() {
        let v120 = Version::new("1.2.0");
        let v130 = Version::new("1.3.0");

        assert_eq!(VersionStatus::of(&v120, &v120), VersionStatus::UpToDate);
        assert_eq!(VersionStatus::of(&v120, &v130), VersionStatus::UpdateAvailable);
        assert_eq!(
            VersionStatus::of(&Version::unknown(), &v130),
            VersionStatus::Ambiguous
        );
        assert_eq!(
            VersionStatus::of(&Version::unknown(), &Version::unknown()),
            VersionStatus::Ambiguous
        );
        assert!(VersionStatus::Ambiguous.is_update_candidate());
        assert!(!VersionStatus::UpToDate.is_update_candidate());
    }

    #[test]
    fn test_local_version_from_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name": "bot", "version": "2.4.1"}"#,
        )
        .unwrap();
        assert_eq!(local_version(dir.path()), Version::new("2.4.1"));
    }

    #[test]
    fn test_local_version_falls_back_to_settings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name": "bot"}"#).unwrap();
        fs::write(
            dir.path().join("settings.js"),
            "global.owner = '123'\nglobal.version = \"3.0.0-beta\"\n",
        )
        .unwrap();
        assert_eq!(local_version(dir.path()), Version::new("3.0.0-beta"));
    }

    #[test]
    fn test_local_version_unknown() {
        let dir = TempDir::new().unwrap();
        assert!(local_version(dir.path()).is_unknown());

        fs::write(dir.path().join("package.json"), "{not json").unwrap();
        assert!(local_version(dir.path()).is_unknown());

        assert!(local_version(Path::new("/nonexistent/client")).is_unknown());
    }

    #[test]
    fn test_raw_manifest_url() {
        assert_eq!(
            raw_manifest_url("https://github.com/acme/bot.git", "main"),
            "https://raw.githubusercontent.com/acme/bot/main/package.json"
        );
        assert_eq!(
            raw_manifest_url("https://git.example.com/acme/bot", "master"),
            "https://git.example.com/acme/bot/raw/master/package.json"
        );
    }

    #[test]
    fn test_remote_version_falls_back_to_second_branch() {
        let reader = Arc::new(StubReader {
            versions: vec![("master".to_string(), Version::new("1.3.0"))],
            asked: Mutex::new(Vec::new()),
        });
        let resolver = VersionResolver::new(
            reader.clone(),
            vec!["main".to_string(), "master".to_string()],
        );

        assert_eq!(resolver.remote_version("src"), Version::new("1.3.0"));
        assert_eq!(*reader.asked.lock().unwrap(), vec!["main", "master"]);
    }

    #[test]
    fn test_remote_failure_degrades_to_unknown() {
        let reader = Arc::new(StubReader {
            versions: Vec::new(),
            asked: Mutex::new(Vec::new()),
        });
        let resolver = VersionResolver::new(reader, vec!["main".to_string()]);
        assert!(resolver.remote_version("src").is_unknown());
    }
}
