//! Multi-strategy archive extraction
//!
//! Hosts differ in what they can unzip with. [`ArchiveExtractor`] holds an
//! ordered list of [`ExtractStrategy`] implementations and tries each one
//! that reports itself available until the package's entry point shows up
//! in the destination, either at its declared path or under one of the
//! directory variants probed by [`PackageLocator`].
//!
//! A missing strategy is skipped silently. Only running out of strategies
//! is an error.

mod builtin;
mod unzip_command;
mod zip_archive;

pub use builtin::{BuiltinZipReader, BuiltinZipStrategy, ZipEntry};
pub use unzip_command::UnzipCommandStrategy;
pub use zip_archive::ZipArchiveStrategy;

use anyhow::{anyhow, Result};
use std::fs;
use std::path::Path;
use tether_core::types::{ExtractionConfig, PackageSpec};
use tether_core::Error;
use tracing::{debug, info, warn};

use crate::locator::PackageLocator;

/// One way of unpacking a zip archive into a directory
pub trait ExtractStrategy: Send + Sync {
    /// Name used in configuration and logs
    fn name(&self) -> &'static str;

    /// Whether this strategy can run in the current environment
    fn is_available(&self) -> bool;

    /// Unpack every entry of `archive` under `dest`
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

pub struct ArchiveExtractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
    locator: PackageLocator,
}

impl ArchiveExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self {
            strategies,
            locator: PackageLocator::new(),
        }
    }

    /// zip library, then the host `unzip`, then the builtin reader
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Box::new(ZipArchiveStrategy),
            Box::new(UnzipCommandStrategy::default()),
            Box::new(BuiltinZipStrategy),
        ])
    }

    /// Build the strategy chain named in configuration
    pub fn from_config(config: &ExtractionConfig) -> tether_core::Result<Self> {
        let mut strategies: Vec<Box<dyn ExtractStrategy>> = Vec::new();
        for name in &config.strategies {
            let strategy: Box<dyn ExtractStrategy> = match name.as_str() {
                "zip" => Box::new(ZipArchiveStrategy),
                "unzip-command" => Box::new(UnzipCommandStrategy::new(&config.unzip_command)),
                "builtin" => Box::new(BuiltinZipStrategy),
                other => {
                    return Err(Error::invalid_config(format!(
                        "Unknown extraction strategy '{}'. Valid strategies: zip, unzip-command, builtin",
                        other
                    )))
                }
            };
            strategies.push(strategy);
        }
        if strategies.is_empty() {
            return Err(Error::invalid_config(
                "extraction.strategies must name at least one strategy",
            ));
        }
        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Unpack with the first available strategy that succeeds
    ///
    /// No package verification; used for registry downloads where the
    /// caller checks the result itself.
    pub fn unpack(&self, archive: &Path, dest: &Path) -> Result<&'static str> {
        fs::create_dir_all(dest)?;
        let mut last_error = None;
        for strategy in self.strategies.iter().filter(|s| s.is_available()) {
            match strategy.extract(archive, dest) {
                Ok(()) => return Ok(strategy.name()),
                Err(e) => {
                    warn!("{} could not unpack {}: {}", strategy.name(), archive.display(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("no extraction strategy is available")))
    }

    /// Extract `archive` into `dest` and verify that `spec` landed there
    ///
    /// Returns the name of the strategy that produced the package.
    pub fn try_extract(
        &self,
        spec: &PackageSpec,
        archive: &Path,
        dest: &Path,
    ) -> tether_core::Result<&'static str> {
        if !archive.is_file() {
            return Err(Error::not_found(format!(
                "archive for {} at {}",
                spec.slug,
                archive.display()
            )));
        }
        fs::create_dir_all(dest)?;

        let mut attempted = Vec::new();
        for strategy in &self.strategies {
            if !strategy.is_available() {
                debug!("Extraction strategy '{}' unavailable, skipping", strategy.name());
                continue;
            }
            attempted.push(strategy.name());

            if let Err(e) = strategy.extract(archive, dest) {
                warn!(
                    "Extraction strategy '{}' failed for {}: {}",
                    strategy.name(),
                    spec.slug,
                    e
                );
                continue;
            }

            if dest.join(&spec.entry_point).is_file() {
                info!("Extracted {} with {}", spec.slug, strategy.name());
                return Ok(strategy.name());
            }

            if self.locator.locate(spec, dest) {
                info!(
                    "Extracted {} with {} (non-standard layout)",
                    spec.slug,
                    strategy.name()
                );
                return Ok(strategy.name());
            }

            debug!(
                "'{}' unpacked {} but no package for {} was found",
                strategy.name(),
                archive.display(),
                spec.slug
            );
        }

        Err(Error::extraction_exhausted(&spec.slug, &attempted))
    }

    /// Boolean form of [`try_extract`](Self::try_extract)
    pub fn extract(&self, spec: &PackageSpec, archive: &Path, dest: &Path) -> bool {
        match self.try_extract(spec, archive, dest) {
            Ok(_) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::with_defaults()
    }
}
