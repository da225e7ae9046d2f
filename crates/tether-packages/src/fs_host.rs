//! Filesystem-backed host registry
//!
//! Packages live under a package root; the set of active entry points is
//! persisted in the global scope of a [`JsonFileStore`]. Installed versions
//! come from entry-point headers. Registry installs download the release
//! archive and unpack it into the root.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::archive::ArchiveExtractor;
use crate::header::read_header;
use crate::host::{HostRegistry, RemoteMetadata};
use crate::remote::RegistryClient;
use crate::store::{JsonFileStore, KeyValueStore, Scope};

const ACTIVE_KEY: &str = "active_packages";

pub struct FsHost {
    root: PathBuf,
    state: JsonFileStore,
    registry: RegistryClient,
    extractor: Arc<ArchiveExtractor>,
}

impl FsHost {
    pub fn new(
        root: impl Into<PathBuf>,
        state: JsonFileStore,
        registry: RegistryClient,
        extractor: Arc<ArchiveExtractor>,
    ) -> Self {
        Self {
            root: root.into(),
            state,
            registry,
            extractor,
        }
    }

    /// Active entry points, sorted
    pub fn active_packages(&self) -> Result<BTreeSet<String>> {
        match self.state.get(Scope::Global, ACTIVE_KEY)? {
            Some(value) => serde_json::from_value(value).context("Corrupt active package list"),
            None => Ok(BTreeSet::new()),
        }
    }

    fn set_active(&self, entry_point: &str, active: bool) -> Result<()> {
        let mut parse_error = None;
        self.state.update(Scope::Global, ACTIVE_KEY, |current| {
            let mut set: BTreeSet<String> = match current {
                Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                    parse_error = Some(e);
                    BTreeSet::new()
                }),
                None => BTreeSet::new(),
            };
            if active {
                set.insert(entry_point.to_string());
            } else {
                set.remove(entry_point);
            }
            serde_json::to_value(set).unwrap_or(Value::Array(Vec::new()))
        })?;
        if let Some(e) = parse_error {
            debug!("Replaced unreadable active package list: {}", e);
        }
        Ok(())
    }

    /// Unpack a downloaded or local archive into the package root
    fn install_archive(&self, archive: &Path) -> Result<()> {
        let strategy = self.extractor.unpack(archive, &self.root)?;
        debug!("Unpacked {} with {}", archive.display(), strategy);
        Ok(())
    }

    /// Install from a URL or, when it names an existing file, a local archive
    fn install_from(&self, source_ref: &str) -> Result<()> {
        let local = Path::new(source_ref);
        if local.is_file() {
            return self.install_archive(local);
        }
        let download = self.registry.download(source_ref)?;
        self.install_archive(download.path())
    }
}

/// First path component of an entry point, or its stem for single files
fn slug_of(entry_point: &str) -> Option<String> {
    let path = Path::new(entry_point);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(dir)), Some(_)) => dir.to_str().map(str::to_string),
        (Some(Component::Normal(_)), None) => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string),
        _ => None,
    }
}

impl HostRegistry for FsHost {
    fn package_root(&self) -> &Path {
        &self.root
    }

    fn is_active(&self, entry_point: &str) -> Result<bool> {
        Ok(self.active_packages()?.contains(entry_point))
    }

    fn installed_version(&self, entry_point: &str) -> Result<Option<String>> {
        if !self.is_present(entry_point) {
            return Ok(None);
        }
        Ok(read_header(&self.root.join(entry_point))?.version)
    }

    fn fetch_metadata(&self, slug: &str) -> Result<RemoteMetadata> {
        self.registry.fetch_metadata(slug)
    }

    fn install(&self, source_ref: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        self.install_from(source_ref)
    }

    fn activate(&self, entry_point: &str) -> Result<()> {
        let path = self.root.join(entry_point);
        if !path.is_file() {
            bail!("Package file does not exist: {}", entry_point);
        }
        if !read_header(&path)?.is_package() {
            bail!("Package file has no valid header: {}", entry_point);
        }
        self.set_active(entry_point, true)?;
        info!("Activated {}", entry_point);
        Ok(())
    }

    fn deactivate(&self, entry_point: &str) -> Result<()> {
        self.set_active(entry_point, false)?;
        info!("Deactivated {}", entry_point);
        Ok(())
    }

    fn upgrade(&self, entry_point: &str) -> Result<()> {
        let slug = slug_of(entry_point)
            .ok_or_else(|| anyhow!("Cannot derive a slug from {}", entry_point))?;
        let metadata = self.registry.fetch_metadata(&slug)?;
        let download = self.registry.download(&metadata.download_link)?;

        // Remove the old copy only once the new archive is on disk
        let install_dir = Path::new(entry_point)
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        match install_dir {
            Some(dir) => {
                let dir = self.root.join(dir);
                if dir.is_dir() {
                    fs::remove_dir_all(&dir)
                        .with_context(|| format!("Failed to remove {}", dir.display()))?;
                }
            }
            None => {
                let file = self.root.join(entry_point);
                if file.is_file() {
                    fs::remove_file(&file)
                        .with_context(|| format!("Failed to remove {}", file.display()))?;
                }
            }
        }

        self.install_archive(download.path())?;
        if !self.is_present(entry_point) {
            bail!("Upgrade of {} did not produce {}", slug, entry_point);
        }
        info!("Upgraded {} to {}", slug, metadata.version);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tether_core::types::RegistryConfig;

    fn host(temp: &TempDir) -> FsHost {
        FsHost::new(
            temp.path().join("packages"),
            JsonFileStore::new(temp.path().join("state")),
            RegistryClient::new(&RegistryConfig::default()).unwrap(),
            Arc::new(ArchiveExtractor::with_defaults()),
        )
    }

    fn write_package(temp: &TempDir, entry: &str, header: &str) {
        let path = temp.path().join("packages").join(entry);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, header).unwrap();
    }

    #[test]
    fn test_activate_requires_valid_header() {
        let temp = TempDir::new().unwrap();
        let host = host(&temp);

        assert!(host.activate("ghost/ghost.php").is_err());

        write_package(&temp, "plain/plain.php", "<?php echo 1;");
        assert!(host.activate("plain/plain.php").is_err());

        write_package(&temp, "forms/forms.php", "<?php\n/* Plugin Name: Forms\n Version: 2.1 */");
        host.activate("forms/forms.php").unwrap();
        assert!(host.is_active("forms/forms.php").unwrap());
        assert_eq!(
            host.installed_version("forms/forms.php").unwrap().as_deref(),
            Some("2.1")
        );

        host.deactivate("forms/forms.php").unwrap();
        assert!(!host.is_active("forms/forms.php").unwrap());
        assert!(host.is_present("forms/forms.php"));
    }

    #[test]
    fn test_activation_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        write_package(&temp, "a/a.php", "<?php /* Plugin Name: A */");
        host(&temp).activate("a/a.php").unwrap();
        assert!(host(&temp).is_active("a/a.php").unwrap());
    }

    #[test]
    fn test_corrupt_state_surfaces_as_error() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state");
        fs::create_dir_all(&state).unwrap();
        fs::write(state.join("options.json"), "{ not json").unwrap();
        assert!(host(&temp).is_active("a/a.php").is_err());
    }

    #[test]
    fn test_missing_package_has_no_version() {
        let temp = TempDir::new().unwrap();
        assert_eq!(host(&temp).installed_version("a/a.php").unwrap(), None);
    }

    #[test]
    fn test_slug_of() {
        assert_eq!(slug_of("forms/forms.php").as_deref(), Some("forms"));
        assert_eq!(slug_of("hello.php").as_deref(), Some("hello"));
        assert_eq!(slug_of("/abs/x.php"), None);
    }
}
