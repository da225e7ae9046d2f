//! Mock host registry
//!
//! Package files are written to a real directory so that the filesystem
//! side of the engine (locator, extraction, removal) runs for real. The
//! activation registry and the remote registry are in memory, and every
//! mutating call is recorded.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tether_packages::header::read_header;
use tether_packages::{HostRegistry, RemoteMetadata};

use super::builders::package_header;

/// One recorded host call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    FetchMetadata(String),
    Install(String),
    Activate(String),
    Deactivate(String),
    Upgrade(String),
}

impl HostCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostCall::FetchMetadata(_))
    }
}

/// What a registry download unpacks to
#[derive(Debug, Clone)]
struct RegistryRelease {
    entry_point: String,
    version: String,
}

pub struct MockHost {
    root: PathBuf,
    active: Mutex<HashSet<String>>,
    metadata: Mutex<HashMap<String, RemoteMetadata>>,
    releases: Mutex<HashMap<String, RegistryRelease>>,
    /// (operation, key) pairs that fail when called
    failures: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<HostCall>>,
}

impl MockHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        fs::create_dir_all(&root).unwrap();
        Self {
            root,
            active: Mutex::new(HashSet::new()),
            metadata: Mutex::new(HashMap::new()),
            releases: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Publish `slug` in the mock registry; installing it writes `entry_point`
    pub fn publish(&self, slug: &str, entry_point: &str, version: &str) {
        let link = format!("https://downloads.test/{}.{}.zip", slug, version);
        self.metadata.lock().unwrap().insert(
            slug.to_string(),
            RemoteMetadata {
                slug: slug.to_string(),
                name: slug.to_string(),
                version: version.to_string(),
                download_link: link.clone(),
            },
        );
        self.releases.lock().unwrap().insert(
            link,
            RegistryRelease {
                entry_point: entry_point.to_string(),
                version: version.to_string(),
            },
        );
    }

    /// Put an inactive package on disk
    pub fn place(&self, entry_point: &str, version: &str) {
        write_package(&self.root, entry_point, version);
    }

    /// Put an active package on disk
    pub fn place_active(&self, entry_point: &str, version: &str) {
        self.place(entry_point, version);
        self.active.lock().unwrap().insert(entry_point.to_string());
    }

    /// Make `operation` fail for `key` (a slug for metadata, an entry point or link otherwise)
    pub fn fail(&self, operation: &str, key: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert((operation.to_string(), key.to_string()));
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    pub fn install_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostCall::Install(_)))
            .count()
    }

    pub fn activation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HostCall::Activate(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn active_set(&self) -> HashSet<String> {
        self.active.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &str, key: &str) -> Result<()> {
        if self
            .failures
            .lock()
            .unwrap()
            .contains(&(operation.to_string(), key.to_string()))
        {
            bail!("injected {} failure for {}", operation, key);
        }
        Ok(())
    }
}

impl HostRegistry for MockHost {
    fn package_root(&self) -> &Path {
        &self.root
    }

    fn is_active(&self, entry_point: &str) -> Result<bool> {
        self.check("is_active", entry_point)?;
        Ok(self.active.lock().unwrap().contains(entry_point))
    }

    fn installed_version(&self, entry_point: &str) -> Result<Option<String>> {
        if !self.is_present(entry_point) {
            return Ok(None);
        }
        Ok(read_header(&self.root.join(entry_point))?.version)
    }

    fn fetch_metadata(&self, slug: &str) -> Result<RemoteMetadata> {
        self.record(HostCall::FetchMetadata(slug.to_string()));
        self.check("fetch_metadata", slug)?;
        self.metadata
            .lock()
            .unwrap()
            .get(slug)
            .cloned()
            .ok_or_else(|| anyhow!("Plugin not found."))
    }

    fn install(&self, source_ref: &str) -> Result<()> {
        self.record(HostCall::Install(source_ref.to_string()));
        self.check("install", source_ref)?;
        let release = self
            .releases
            .lock()
            .unwrap()
            .get(source_ref)
            .cloned()
            .ok_or_else(|| anyhow!("Download failed: {}", source_ref))?;
        write_package(&self.root, &release.entry_point, &release.version);
        Ok(())
    }

    fn activate(&self, entry_point: &str) -> Result<()> {
        self.record(HostCall::Activate(entry_point.to_string()));
        self.check("activate", entry_point)?;
        if !self.is_present(entry_point) {
            bail!("Plugin file does not exist.");
        }
        self.active.lock().unwrap().insert(entry_point.to_string());
        Ok(())
    }

    fn deactivate(&self, entry_point: &str) -> Result<()> {
        self.record(HostCall::Deactivate(entry_point.to_string()));
        self.check("deactivate", entry_point)?;
        self.active.lock().unwrap().remove(entry_point);
        Ok(())
    }

    fn upgrade(&self, entry_point: &str) -> Result<()> {
        self.record(HostCall::Upgrade(entry_point.to_string()));
        self.check("upgrade", entry_point)?;
        let release = self
            .releases
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.entry_point == entry_point)
            .max_by(|a, b| a.version.cmp(&b.version))
            .cloned()
            .ok_or_else(|| anyhow!("No update available for {}", entry_point))?;
        write_package(&self.root, entry_point, &release.version);
        Ok(())
    }
}

/// Write an entry-point file with a parseable header
pub fn write_package(root: &Path, entry_point: &str, version: &str) {
    let path = root.join(entry_point);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let name = Path::new(entry_point)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("package");
    fs::write(path, package_header(name, version)).unwrap();
}
