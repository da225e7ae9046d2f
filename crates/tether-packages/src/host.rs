//! Host package registry abstraction
//!
//! Everything the reconciliation engine knows about the live system comes
//! through [`HostRegistry`]: which packages are present, which are active,
//! what version is installed, and the install/activate/upgrade primitives.
//! Implementations own all side effects; the engine only sequences them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Registry-side description of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Source reference handed to [`HostRegistry::install`]
    pub download_link: String,
}

pub trait HostRegistry: Send + Sync {
    /// Root directory every entry point is relative to
    fn package_root(&self) -> &Path;

    /// Whether the entry point is currently enabled
    fn is_active(&self, entry_point: &str) -> Result<bool>;

    /// Whether the entry-point file exists under the package root
    fn is_present(&self, entry_point: &str) -> bool {
        self.package_root().join(entry_point).is_file()
    }

    /// Version declared by the installed entry point, if it declares one
    fn installed_version(&self, entry_point: &str) -> Result<Option<String>>;

    /// Look up a package in the remote registry
    fn fetch_metadata(&self, slug: &str) -> Result<RemoteMetadata>;

    /// Install from a source reference obtained via [`fetch_metadata`](Self::fetch_metadata)
    fn install(&self, source_ref: &str) -> Result<()>;

    fn activate(&self, entry_point: &str) -> Result<()>;

    fn deactivate(&self, entry_point: &str) -> Result<()>;

    /// Replace an installed registry package with the latest release
    fn upgrade(&self, entry_point: &str) -> Result<()>;
}
