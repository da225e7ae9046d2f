//! Package location after extraction
//!
//! Archives are not required to unpack into a directory named after the
//! slug. GitHub snapshots add `-master`, some authors capitalize or use
//! underscores. [`PackageLocator`] probes those variants and accepts either
//! the expected entry file or any top-level script that declares a header.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tether_core::types::PackageSpec;
use tether_core::utils::ucfirst;
use tracing::debug;

use crate::header::read_header;

#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLocator;

impl PackageLocator {
    pub fn new() -> Self {
        Self
    }

    /// Directory-name variants probed for `spec`, deduplicated, in probe order
    pub fn candidate_dirs(spec: &PackageSpec) -> Vec<String> {
        let slug = spec.slug.as_str();
        let declared = spec
            .install_dir()
            .and_then(|dir| dir.to_str())
            .map(str::to_string);

        let variants = declared.into_iter().chain([
            slug.to_string(),
            format!("{}-master", slug),
            slug.to_lowercase(),
            ucfirst(slug),
            slug.replace('-', "_"),
        ]);

        let mut seen = HashSet::new();
        variants
            .filter(|v| !v.is_empty() && seen.insert(v.clone()))
            .collect()
    }

    /// Whether a recognizable package for `spec` exists under `root`
    pub fn locate(&self, spec: &PackageSpec, root: &Path) -> bool {
        self.find(spec, root).is_some()
    }

    /// Path of the file that proves the package was extracted
    pub fn find(&self, spec: &PackageSpec, root: &Path) -> Option<PathBuf> {
        let entry_name = spec.entry_file_name()?;
        let extension = Path::new(entry_name)
            .extension()
            .and_then(|ext| ext.to_str());

        for candidate in Self::candidate_dirs(spec) {
            let dir = root.join(&candidate);

            let expected = dir.join(entry_name);
            if expected.is_file() {
                debug!("Located {} at {}", spec.slug, expected.display());
                return Some(expected);
            }

            if !dir.is_dir() {
                continue;
            }

            if let Some(found) = scan_for_header(&dir, extension) {
                debug!(
                    "Located {} by header scan at {}",
                    spec.slug,
                    found.display()
                );
                return Some(found);
            }
        }

        debug!("No recognizable package for {} under {}", spec.slug, root.display());
        None
    }
}

/// First top-level file (sorted by name) whose header declares a name
fn scan_for_header(dir: &Path, extension: Option<&str>) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| match extension {
            Some(ext) => path.extension().and_then(|e| e.to_str()) == Some(ext),
            None => true,
        })
        .collect();
    files.sort();

    files
        .into_iter()
        .find(|path| read_header(path).map(|h| h.is_package()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_candidate_order_and_dedup() {
        let spec = PackageSpec::local("my-forms", "My Forms", "my-forms/my-forms.php", None);
        assert_eq!(
            PackageLocator::candidate_dirs(&spec),
            vec!["my-forms", "my-forms-master", "My-forms", "my_forms"]
        );
    }

    #[test]
    fn test_declared_dir_is_probed_first() {
        let spec = PackageSpec::local("forms", "Forms", "forms-pro/forms.php", None);
        assert_eq!(PackageLocator::candidate_dirs(&spec)[0], "forms-pro");
    }

    #[test]
    fn test_finds_expected_file_in_master_dir() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "gallery-master/gallery.php", "<?php");
        let spec = PackageSpec::local("gallery", "Gallery", "gallery/gallery.php", None);

        let found = PackageLocator::new().find(&spec, temp.path()).unwrap();
        assert!(found.ends_with("gallery-master/gallery.php"));
    }

    #[test]
    fn test_header_scan_accepts_renamed_main_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Slider/readme.php", "<?php // docs");
        write(temp.path(), "Slider/slider-main.php", "<?php\n/* Plugin Name: Slider */");
        write(temp.path(), "Slider/notes.txt", "Plugin Name: Wrong Extension");
        let spec = PackageSpec::local("slider", "Slider", "slider/slider.php", None);

        let found = PackageLocator::new().find(&spec, temp.path()).unwrap();
        assert!(found.ends_with("Slider/slider-main.php"));
    }

    #[test]
    fn test_nothing_recognizable() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "unrelated/index.php", "<?php // silence");
        write(temp.path(), "tabs/helpers.php", "<?php function x() {}");
        let spec = PackageSpec::local("tabs", "Tabs", "tabs/tabs.php", None);

        assert!(!PackageLocator::new().locate(&spec, temp.path()));
    }
}
