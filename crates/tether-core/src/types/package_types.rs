//! Package declaration and lifecycle state types

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where a package's installable payload comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageSource {
    /// Fetched from the host's remote package registry
    #[default]
    Registry,
    /// Extracted from a zip archive shipped alongside the parent application
    LocalArchive,
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageSource::Registry => write!(f, "registry"),
            PackageSource::LocalArchive => write!(f, "local"),
        }
    }
}

/// Declared identity of an installable add-on package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageSpec {
    /// Unique key within a catalog
    pub slug: String,

    /// Display name
    pub name: String,

    /// Entry-point path relative to the host package root (e.g. `forms/forms.php`)
    #[serde(alias = "file")]
    pub entry_point: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub featured: bool,

    #[serde(default)]
    pub source: PackageSource,

    /// Minimum acceptable installed version
    #[serde(default, alias = "version", skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    /// Archive path for `LocalArchive` packages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
}

impl PackageSpec {
    /// Declare a registry-sourced package
    pub fn registry(
        slug: impl Into<String>,
        name: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            entry_point: entry_point.into(),
            description: String::new(),
            category: String::new(),
            required: false,
            featured: false,
            source: PackageSource::Registry,
            min_version: None,
            archive: None,
        }
    }

    /// Declare a package installed from a local zip archive
    pub fn local(
        slug: impl Into<String>,
        name: impl Into<String>,
        entry_point: impl Into<String>,
        archive: Option<PathBuf>,
    ) -> Self {
        Self {
            source: PackageSource::LocalArchive,
            archive,
            ..Self::registry(slug, name, entry_point)
        }
    }

    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn as_required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn as_featured(mut self) -> Self {
        self.featured = true;
        self
    }

    pub fn is_local(&self) -> bool {
        self.source == PackageSource::LocalArchive
    }

    /// Minimum version, ignoring an empty declaration
    pub fn min_version(&self) -> Option<&str> {
        self.min_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Directory of the entry point relative to the package root
    ///
    /// `None` for single-file packages that sit directly in the root.
    pub fn install_dir(&self) -> Option<&Path> {
        Path::new(&self.entry_point)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// File name of the entry point (`forms.php` for `forms/forms.php`)
    pub fn entry_file_name(&self) -> Option<&str> {
        Path::new(&self.entry_point)
            .file_name()
            .and_then(|name| name.to_str())
    }
}

/// Lifecycle state of a declared package, computed fresh on every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageState {
    NotInstalled,
    Inactive,
    InactiveNeedsUpdate,
    Active,
    #[serde(rename = "needs-update")]
    ActiveNeedsUpdate,
}

impl PackageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageState::NotInstalled => "not-installed",
            PackageState::Inactive => "inactive",
            PackageState::InactiveNeedsUpdate => "inactive-needs-update",
            PackageState::Active => "active",
            PackageState::ActiveNeedsUpdate => "needs-update",
        }
    }

    /// Human-readable status text
    pub fn label(&self) -> &'static str {
        match self {
            PackageState::NotInstalled => "Not installed",
            PackageState::Inactive => "Installed but not active",
            PackageState::InactiveNeedsUpdate => "Update Available (Inactive)",
            PackageState::Active => "Active",
            PackageState::ActiveNeedsUpdate => "Update Available",
        }
    }

    pub fn is_installed(&self) -> bool {
        !matches!(self, PackageState::NotInstalled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PackageState::Active | PackageState::ActiveNeedsUpdate)
    }

    pub fn needs_update(&self) -> bool {
        matches!(
            self,
            PackageState::ActiveNeedsUpdate | PackageState::InactiveNeedsUpdate
        )
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of user-facing prompt with its own suppression timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeClass {
    RequiredMissing,
    RecommendedMissing,
    UpdatesAvailable,
}

impl NoticeClass {
    pub const ALL: [NoticeClass; 3] = [
        NoticeClass::RequiredMissing,
        NoticeClass::RecommendedMissing,
        NoticeClass::UpdatesAvailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeClass::RequiredMissing => "required",
            NoticeClass::RecommendedMissing => "recommended",
            NoticeClass::UpdatesAvailable => "updates",
        }
    }

    /// Per-user storage key holding the last dismissal timestamp
    pub fn storage_key(&self) -> &'static str {
        match self {
            NoticeClass::RequiredMissing => "hide_install_notice_time",
            NoticeClass::RecommendedMissing => "info_recommend_packages",
            NoticeClass::UpdatesAvailable => "hide_update_notice_time",
        }
    }

    /// Suppression window applied when no configuration overrides it
    pub fn default_ttl(&self) -> Duration {
        match self {
            NoticeClass::RequiredMissing | NoticeClass::UpdatesAvailable => Duration::days(7),
            NoticeClass::RecommendedMissing => Duration::days(30),
        }
    }
}

impl fmt::Display for NoticeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NoticeClass {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" | "required-missing" | "install" => Ok(NoticeClass::RequiredMissing),
            "recommended" | "recommended-missing" => Ok(NoticeClass::RecommendedMissing),
            "updates" | "update" | "updates-available" => Ok(NoticeClass::UpdatesAvailable),
            other => Err(crate::Error::invalid_config(format!(
                "Unknown notice class '{}'. Valid classes: required, recommended, updates",
                other
            ))),
        }
    }
}
