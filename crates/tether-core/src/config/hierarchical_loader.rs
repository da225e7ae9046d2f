//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Global config (~/.tether/config.yaml) or an explicit `--config` file
//! 3. Environment variables (TETHER_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{CatalogFile, CatalogOverlay, RuntimeConfig, MAX_MARKER_SECS, MAX_TTL_DAYS};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Embedded base catalog
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/catalog/"]
#[prefix = ""]
struct EmbeddedCatalogs;

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration and relative paths
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a new hierarchical config loader rooted at ~/.tether
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the standard config directory (~/.tether)
    fn get_config_dir() -> Result<Utf8PathBuf> {
        if let Ok(dir) = env::var("TETHER_HOME") {
            return Ok(Utf8PathBuf::from(dir));
        }

        let home = crate::utils::get_home_dir()
            .map_err(|e| Error::invalid_config(e.to_string()))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {:?}", p)))?;

        let config_dir = home.join(".tether");
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(config_dir)
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let global_path = self.config_dir.join("config.yaml");
        let file = global_path.exists().then_some(global_path);
        self.load_with_file(file.as_deref())
    }

    /// Load runtime configuration using an explicit file in place of the global one
    pub fn load_with_file(&self, file: Option<&Utf8Path>) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded::<EmbeddedConfigs, RuntimeConfig>(
            "runtime-defaults.yaml",
        )?;

        if let Some(path) = file {
            if !path.exists() {
                return Err(Error::config_not_found(path.as_str()));
            }
            debug!("Loading runtime config from {}", path);
            let file_config = self.load_yaml_file::<RuntimeConfig>(path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        config = self.apply_env_overrides(config)?;
        Self::validate(&config)?;
        self.resolve_paths(&mut config);

        Ok(config)
    }

    /// Load the base catalog from the configured file or the embedded list
    pub fn load_base_catalog(&self, config: &RuntimeConfig) -> Result<CatalogFile> {
        match &config.catalog.base {
            Some(path) => {
                let path = Self::utf8(path)?;
                if !path.exists() {
                    return Err(Error::config_not_found(path.as_str()));
                }
                self.load_yaml_file::<CatalogFile>(&path)
            }
            None => Self::load_embedded::<EmbeddedCatalogs, CatalogFile>("base-catalog.yaml"),
        }
    }

    /// Load overlay files from the configured directory, sorted by file name
    pub fn load_overlays(&self, config: &RuntimeConfig) -> Result<Vec<(String, CatalogOverlay)>> {
        let Some(dir) = &config.catalog.overlays else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            debug!("Catalog overlay directory {:?} does not exist", dir);
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        files.sort();

        let mut overlays = Vec::with_capacity(files.len());
        for path in files {
            let path = Self::utf8(&path)?;
            let name = path.file_stem().unwrap_or_default().to_string();
            overlays.push((name, self.load_yaml_file::<CatalogOverlay>(&path)?));
        }

        Ok(overlays)
    }

    /// Load an embedded file and parse it
    fn load_embedded<E: RustEmbed, T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = E::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two runtime configs (base is overridden by overlay)
    ///
    /// Overlay sections always carry serde defaults for omitted keys, so a
    /// section present in the file replaces the embedded one wholesale. The
    /// catalog section is merged per key so a file that only names overlays
    /// keeps an embedded base path.
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            paths: overlay.paths,
            registry: overlay.registry,
            convergence: overlay.convergence,
            notices: overlay.notices,
            extraction: overlay.extraction,
            catalog: crate::types::CatalogConfig {
                base: overlay.catalog.base.or(base.catalog.base),
                overlays: overlay.catalog.overlays.or(base.catalog.overlays),
            },
        }
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Ok(val) = env::var("TETHER_PACKAGES_DIR") {
            config.paths.packages_dir = PathBuf::from(val);
        }

        if let Ok(val) = env::var("TETHER_STATE_DIR") {
            config.paths.state_dir = PathBuf::from(val);
        }

        if let Ok(val) = env::var("TETHER_ARCHIVE_DIR") {
            config.paths.archive_dir = PathBuf::from(val);
        }

        if let Ok(val) = env::var("TETHER_REGISTRY_URL") {
            config.registry.api_url = val;
        }

        if let Ok(val) = env::var("TETHER_HTTP_TIMEOUT_SECS") {
            config.registry.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("TETHER_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("TETHER_CHECK_INTERVAL_SECS") {
            config.convergence.check_interval_secs = val.parse().map_err(|_| {
                Error::invalid_config("TETHER_CHECK_INTERVAL_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("TETHER_UNZIP_COMMAND") {
            config.extraction.unzip_command = val;
        }

        if let Ok(val) = env::var("TETHER_CATALOG") {
            config.catalog.base = Some(PathBuf::from(val));
        }

        Ok(config)
    }

    /// Reject timing values that cannot be added to a timestamp
    fn validate(config: &RuntimeConfig) -> Result<()> {
        let mut invalid = config.convergence.out_of_range();
        if !invalid.is_empty() {
            return Err(Error::invalid_config(format!(
                "{} must be at most {} seconds",
                invalid.join(", "),
                MAX_MARKER_SECS
            )));
        }
        invalid = config.notices.out_of_range();
        if !invalid.is_empty() {
            return Err(Error::invalid_config(format!(
                "{} must be between 0 and {} days",
                invalid.join(", "),
                MAX_TTL_DAYS
            )));
        }
        Ok(())
    }

    /// Anchor relative paths at the config directory
    fn resolve_paths(&self, config: &mut RuntimeConfig) {
        let root = self.config_dir.as_std_path();
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };

        anchor(&mut config.paths.packages_dir);
        anchor(&mut config.paths.state_dir);
        anchor(&mut config.paths.archive_dir);
        if let Some(base) = config.catalog.base.as_mut() {
            anchor(base);
        }
        if let Some(overlays) = config.catalog.overlays.as_mut() {
            anchor(overlays);
        }
    }

    fn utf8(path: &Path) -> Result<Utf8PathBuf> {
        Utf8PathBuf::from_path_buf(path.to_path_buf())
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 path: {:?}", p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn loader(dir: &TempDir) -> HierarchicalConfigLoader {
        HierarchicalConfigLoader::with_dir(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap())
    }

    #[test]
    #[serial]
    fn test_embedded_defaults_resolve_relative_to_config_dir() {
        let dir = TempDir::new().unwrap();
        let config = loader(&dir).load_runtime_config().unwrap();

        assert_eq!(config.paths.packages_dir, dir.path().join("packages"));
        assert_eq!(config.paths.state_dir, dir.path().join("state"));
        assert_eq!(config.convergence.check_interval_secs, 3600);
    }

    #[test]
    #[serial]
    fn test_global_file_overrides_embedded() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "paths:\n  packages-dir: /srv/site/packages\nnotices:\n  recommended-ttl-days: 14\n",
        )
        .unwrap();

        let config = loader(&dir).load_runtime_config().unwrap();
        assert_eq!(config.paths.packages_dir, PathBuf::from("/srv/site/packages"));
        assert_eq!(config.notices.recommended_ttl_days, 14);
        assert_eq!(config.notices.required_ttl_days, 7);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        env::set_var("TETHER_CHECK_INTERVAL_SECS", "60");
        let config = loader(&dir).load_runtime_config();
        env::remove_var("TETHER_CHECK_INTERVAL_SECS");

        assert_eq!(config.unwrap().convergence.check_interval_secs, 60);
    }

    #[test]
    #[serial]
    fn test_invalid_env_number_is_rejected() {
        let dir = TempDir::new().unwrap();
        env::set_var("TETHER_HTTP_TIMEOUT_SECS", "soon");
        let result = loader(&dir).load_runtime_config();
        env::remove_var("TETHER_HTTP_TIMEOUT_SECS");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_oversized_intervals_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "convergence:\n  check-interval-secs: 10000000000000\n",
        )
        .unwrap();

        match loader(&dir).load_runtime_config() {
            Err(Error::InvalidConfig { message }) => {
                assert!(message.contains("check-interval-secs"), "{}", message)
            }
            other => panic!("expected invalid config, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[serial]
    fn test_oversized_env_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        env::set_var("TETHER_CHECK_INTERVAL_SECS", "18446744073709551615");
        let result = loader(&dir).load_runtime_config();
        env::remove_var("TETHER_CHECK_INTERVAL_SECS");

        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    #[serial]
    fn test_notice_windows_out_of_range_are_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "notices:\n  required-ttl-days: 1000000000000000\n",
        )
        .unwrap();

        assert!(matches!(
            loader(&dir).load_runtime_config(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = loader(&dir).load_with_file(Some(Utf8Path::new("/nonexistent/tether.yaml")));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[test]
    #[serial]
    fn test_embedded_base_catalog_loads() {
        let dir = TempDir::new().unwrap();
        let l = loader(&dir);
        let config = l.load_runtime_config().unwrap();
        let catalog = l.load_base_catalog(&config).unwrap();
        assert!(!catalog.packages.is_empty());
    }

    #[test]
    #[serial]
    fn test_overlays_sorted_by_file_name() {
        let dir = TempDir::new().unwrap();
        let overlay_dir = dir.path().join("catalog.d");
        fs::create_dir_all(&overlay_dir).unwrap();
        fs::write(overlay_dir.join("20-child.yaml"), "remove: [a]\n").unwrap();
        fs::write(overlay_dir.join("10-theme.yml"), "remove: [b]\n").unwrap();
        fs::write(overlay_dir.join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("config.yaml"), "catalog:\n  overlays: catalog.d\n").unwrap();

        let l = loader(&dir);
        let config = l.load_runtime_config().unwrap();
        let overlays = l.load_overlays(&config).unwrap();

        let names: Vec<_> = overlays.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["10-theme", "20-child"]);
    }
}
