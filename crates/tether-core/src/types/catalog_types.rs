//! On-disk catalog file formats

use super::PackageSpec;
use serde::{Deserialize, Serialize};

/// Base catalog file (`catalog.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
}

/// Catalog overlay contributed by a provider file
///
/// Entries in `packages` are added or replace an existing entry with the same
/// slug; `remove` drops slugs after the additions are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogOverlay {
    #[serde(default)]
    pub packages: Vec<PackageSpec>,

    #[serde(default)]
    pub remove: Vec<String>,
}
