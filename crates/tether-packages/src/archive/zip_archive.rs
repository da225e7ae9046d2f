//! Preferred strategy: the `zip` crate

use anyhow::Result;
use std::path::Path;

use super::ExtractStrategy;

/// Extraction through the general-purpose zip library
///
/// Available only when built with the `zip-archive` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveStrategy;

impl ExtractStrategy for ZipArchiveStrategy {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn is_available(&self) -> bool {
        cfg!(feature = "zip-archive")
    }

    #[cfg(feature = "zip-archive")]
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        use anyhow::Context;
        use std::fs::File;

        let file = File::open(archive)
            .with_context(|| format!("Can't open file {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file)
            .with_context(|| format!("Not a zip archive: {}", archive.display()))?;
        zip.extract(dest)
            .with_context(|| format!("Failed to extract into {}", dest.display()))?;
        Ok(())
    }

    #[cfg(not(feature = "zip-archive"))]
    fn extract(&self, _archive: &Path, _dest: &Path) -> Result<()> {
        anyhow::bail!("built without the zip-archive feature")
    }
}
