//! Runtime configuration types for operational parameters

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Longest accepted guard marker lifetime (ten years)
pub const MAX_MARKER_SECS: u64 = 10 * 365 * 86_400;

/// Longest accepted notice suppression window (ten years)
pub const MAX_TTL_DAYS: i64 = 10 * 365;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub convergence: ConvergenceConfig,

    #[serde(default)]
    pub notices: NoticeConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Filesystem locations
///
/// Relative paths are resolved against the Tether home directory (`~/.tether`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Host package root every entry point is relative to
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    /// Persistence for activation state, dismissals and guards
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Directory searched for `<slug>.zip` when a local package has no archive path
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            packages_dir: default_packages_dir(),
            state_dir: default_state_dir(),
            archive_dir: default_archive_dir(),
        }
    }
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from("packages")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("archives")
}

/// Remote package registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistryConfig {
    /// Metadata endpoint (plugins/info/1.2 compatible)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.wordpress.org/plugins/info/1.2/".to_string()
}
fn default_http_timeout() -> u64 {
    60
}
fn default_user_agent() -> String {
    format!(
        "tether/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Timing of the automatic convergence guards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConvergenceConfig {
    /// Minimum interval between required-package sweeps
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Lifetime of the marker set when the parent application is switched in
    #[serde(default = "default_switch_marker")]
    pub switch_marker_secs: u64,

    /// Lifetime of the marker set after an automatic install completes
    #[serde(default = "default_installed_marker")]
    pub installed_marker_secs: u64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            switch_marker_secs: default_switch_marker(),
            installed_marker_secs: default_installed_marker(),
        }
    }
}

impl ConvergenceConfig {
    pub fn check_interval(&self) -> Duration {
        marker_duration(self.check_interval_secs)
    }

    pub fn switch_marker(&self) -> Duration {
        marker_duration(self.switch_marker_secs)
    }

    pub fn installed_marker(&self) -> Duration {
        marker_duration(self.installed_marker_secs)
    }

    /// Names of settings outside `0..=MAX_MARKER_SECS`
    pub fn out_of_range(&self) -> Vec<&'static str> {
        [
            ("check-interval-secs", self.check_interval_secs),
            ("switch-marker-secs", self.switch_marker_secs),
            ("installed-marker-secs", self.installed_marker_secs),
        ]
        .into_iter()
        .filter(|(_, secs)| *secs > MAX_MARKER_SECS)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Clamped to `MAX_MARKER_SECS` so unvalidated values cannot overflow a timestamp
fn marker_duration(secs: u64) -> Duration {
    let secs = secs.min(MAX_MARKER_SECS) as i64;
    Duration::try_seconds(secs).unwrap_or(Duration::zero())
}

fn default_check_interval() -> u64 {
    3600 // 1 hour
}
fn default_switch_marker() -> u64 {
    30
}
fn default_installed_marker() -> u64 {
    300 // 5 minutes
}

/// Notice suppression windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoticeConfig {
    #[serde(default = "default_seven_days")]
    pub required_ttl_days: i64,

    #[serde(default = "default_thirty_days")]
    pub recommended_ttl_days: i64,

    #[serde(default = "default_seven_days")]
    pub updates_ttl_days: i64,
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self {
            required_ttl_days: default_seven_days(),
            recommended_ttl_days: default_thirty_days(),
            updates_ttl_days: default_seven_days(),
        }
    }
}

impl NoticeConfig {
    /// Names of settings outside `0..=MAX_TTL_DAYS`
    pub fn out_of_range(&self) -> Vec<&'static str> {
        [
            ("required-ttl-days", self.required_ttl_days),
            ("recommended-ttl-days", self.recommended_ttl_days),
            ("updates-ttl-days", self.updates_ttl_days),
        ]
        .into_iter()
        .filter(|(_, days)| !(0..=MAX_TTL_DAYS).contains(days))
        .map(|(name, _)| name)
        .collect()
    }
}

fn default_seven_days() -> i64 {
    7
}
fn default_thirty_days() -> i64 {
    30
}

/// Archive extraction strategy chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Strategy names in priority order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,

    /// Program used by the `unzip-command` strategy
    #[serde(default = "default_unzip_command")]
    pub unzip_command: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            unzip_command: default_unzip_command(),
        }
    }
}

fn default_strategies() -> Vec<String> {
    vec![
        "zip".to_string(),
        "unzip-command".to_string(),
        "builtin".to_string(),
    ]
}
fn default_unzip_command() -> String {
    "unzip".to_string()
}

/// Catalog sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Base catalog file; the embedded base list is used when unset
    #[serde(default)]
    pub base: Option<PathBuf>,

    /// Directory of overlay files applied as providers in file-name order
    #[serde(default)]
    pub overlays: Option<PathBuf>,
}
