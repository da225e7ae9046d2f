//! Desired-state catalog
//!
//! The catalog is an ordered slug → spec mapping built from a base list and
//! a pipeline of providers. Each provider receives the accumulated catalog
//! and returns a new one; providers run in registration order, so a later
//! provider overrides whatever an earlier one contributed for the same slug.
//!
//! [`CatalogSnapshot`] pairs every spec with its freshly inspected state and
//! derives the filter counts. It is the only full-catalog state sweep.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tether_core::config::HierarchicalConfigLoader;
use tether_core::types::{CatalogOverlay, PackageSpec, PackageState, RuntimeConfig};
use tracing::debug;

use crate::inspector::StateInspector;

/// A catalog transformation applied during [`CatalogBuilder::build`]
pub type CatalogProvider = Box<dyn Fn(Catalog) -> Catalog + Send + Sync>;

/// Ordered, slug-unique package mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<PackageSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from specs in order; a repeated slug replaces the earlier spec
    pub fn from_specs(specs: impl IntoIterator<Item = PackageSpec>) -> Self {
        let mut catalog = Self::new();
        for spec in specs {
            catalog.insert(spec);
        }
        catalog
    }

    /// Insert or replace by slug
    ///
    /// A replaced entry keeps its position; a new slug is appended.
    pub fn insert(&mut self, spec: PackageSpec) -> Option<PackageSpec> {
        match self.position(&spec.slug) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx], spec)),
            None => {
                self.entries.push(spec);
                None
            }
        }
    }

    pub fn remove(&mut self, slug: &str) -> Option<PackageSpec> {
        self.position(slug).map(|idx| self.entries.remove(idx))
    }

    pub fn get(&self, slug: &str) -> Option<&PackageSpec> {
        self.entries.iter().find(|s| s.slug == slug)
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut PackageSpec> {
        self.entries.iter_mut().find(|s| s.slug == slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.position(slug).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PackageSpec> {
        self.entries.iter()
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.slug.as_str()).collect()
    }

    /// Specs flagged `required`, in catalog order
    pub fn required(&self) -> Vec<PackageSpec> {
        self.entries.iter().filter(|s| s.required).cloned().collect()
    }

    pub fn specs(&self) -> &[PackageSpec] {
        &self.entries
    }

    /// Apply an overlay: upsert its packages, then drop its removals
    pub fn apply_overlay(mut self, overlay: &CatalogOverlay) -> Self {
        for spec in &overlay.packages {
            self.insert(spec.clone());
        }
        for slug in &overlay.remove {
            self.remove(slug);
        }
        self
    }

    fn position(&self, slug: &str) -> Option<usize> {
        self.entries.iter().position(|s| s.slug == slug)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a PackageSpec;
    type IntoIter = std::slice::Iter<'a, PackageSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Base list plus registered providers
pub struct CatalogBuilder {
    base: Vec<PackageSpec>,
    providers: Vec<(String, CatalogProvider)>,
}

impl CatalogBuilder {
    pub fn new(base: Vec<PackageSpec>) -> Self {
        Self {
            base,
            providers: Vec::new(),
        }
    }

    /// Base catalog and overlay providers from configuration
    pub fn from_config(loader: &HierarchicalConfigLoader, config: &RuntimeConfig) -> Result<Self> {
        let base = loader.load_base_catalog(config)?;
        let mut builder = Self::new(base.packages);
        for (name, overlay) in loader.load_overlays(config)? {
            builder.register_overlay(name, overlay);
        }
        Ok(builder)
    }

    /// Register a provider; providers run in registration order
    pub fn register(&mut self, name: impl Into<String>, provider: CatalogProvider) -> &mut Self {
        let name = name.into();
        debug!("Registered catalog provider '{}'", name);
        self.providers.push((name, provider));
        self
    }

    pub fn register_overlay(&mut self, name: impl Into<String>, overlay: CatalogOverlay) -> &mut Self {
        self.register(name, Box::new(move |catalog: Catalog| catalog.apply_overlay(&overlay)))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Run the provider pipeline over the base list
    pub fn build(&self) -> Catalog {
        let base = Catalog::from_specs(self.base.iter().cloned());
        self.providers
            .iter()
            .fold(base, |catalog, (name, provider)| {
                let before = catalog.len();
                let next = provider(catalog);
                debug!(
                    "Catalog provider '{}': {} -> {} packages",
                    name,
                    before,
                    next.len()
                );
                next
            })
    }
}

/// Filter tab over a catalog snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogFilter {
    All,
    Featured,
    Required,
    Active,
    Inactive,
    NotInstalled,
}

impl CatalogFilter {
    /// Tabs in display order
    pub const ALL: [CatalogFilter; 6] = [
        CatalogFilter::All,
        CatalogFilter::Featured,
        CatalogFilter::Required,
        CatalogFilter::Active,
        CatalogFilter::Inactive,
        CatalogFilter::NotInstalled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogFilter::All => "all",
            CatalogFilter::Featured => "featured",
            CatalogFilter::Required => "required",
            CatalogFilter::Active => "active",
            CatalogFilter::Inactive => "inactive",
            CatalogFilter::NotInstalled => "not-installed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogFilter::All => "All Packages",
            CatalogFilter::Featured => "Featured",
            CatalogFilter::Required => "Required",
            CatalogFilter::Active => "Active",
            CatalogFilter::Inactive => "Inactive",
            CatalogFilter::NotInstalled => "Not Installed",
        }
    }

    pub fn matches(&self, spec: &PackageSpec, state: PackageState) -> bool {
        match self {
            CatalogFilter::All => true,
            CatalogFilter::Featured => spec.featured,
            CatalogFilter::Required => spec.required,
            CatalogFilter::Active => state == PackageState::Active,
            CatalogFilter::Inactive => matches!(
                state,
                PackageState::Inactive | PackageState::InactiveNeedsUpdate
            ),
            CatalogFilter::NotInstalled => state == PackageState::NotInstalled,
        }
    }
}

impl fmt::Display for CatalogFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CatalogFilter {
    type Err = tether_core::Error;

    fn from_str(s: &str) -> tether_core::Result<Self> {
        CatalogFilter::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                tether_core::Error::invalid_config(format!(
                    "Unknown filter '{}'. Valid filters: all, featured, required, active, inactive, not-installed",
                    s
                ))
            })
    }
}

/// Per-tab package counts
///
/// `active` counts only fully converged packages; `ActiveNeedsUpdate`
/// appears under `all` alone. `inactive` includes `InactiveNeedsUpdate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogCounts {
    pub all: usize,
    pub featured: usize,
    pub required: usize,
    pub active: usize,
    pub inactive: usize,
    pub not_installed: usize,
}

impl CatalogCounts {
    pub fn get(&self, filter: CatalogFilter) -> usize {
        match filter {
            CatalogFilter::All => self.all,
            CatalogFilter::Featured => self.featured,
            CatalogFilter::Required => self.required,
            CatalogFilter::Active => self.active,
            CatalogFilter::Inactive => self.inactive,
            CatalogFilter::NotInstalled => self.not_installed,
        }
    }

    /// Tabs with at least one package, in display order
    pub fn available_filters(&self) -> Vec<CatalogFilter> {
        CatalogFilter::ALL
            .into_iter()
            .filter(|f| self.get(*f) > 0)
            .collect()
    }

    /// First non-empty tab
    pub fn default_filter(&self) -> Option<CatalogFilter> {
        self.available_filters().into_iter().next()
    }
}

/// One catalog entry with its inspected state
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    #[serde(flatten)]
    pub spec: PackageSpec,
    pub state: PackageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
}

impl SnapshotEntry {
    /// Version line shown beside the package
    pub fn version_info(&self) -> Option<String> {
        match (self.installed_version.as_deref(), self.spec.min_version()) {
            (Some(current), Some(required)) => {
                Some(format!("Current: {} | Required: {}", current, required))
            }
            (Some(current), None) => Some(format!("Version: {}", current)),
            (None, Some(required)) => Some(format!("Required Version: {}", required)),
            (None, None) => None,
        }
    }

    /// Action a user would take to move this package forward
    pub fn action(&self) -> Option<&'static str> {
        match self.state {
            PackageState::NotInstalled => Some("install"),
            PackageState::Inactive => Some("activate"),
            PackageState::InactiveNeedsUpdate | PackageState::ActiveNeedsUpdate => Some("update"),
            PackageState::Active => None,
        }
    }
}

/// Catalog paired with freshly inspected states
#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    pub entries: Vec<SnapshotEntry>,
    pub counts: CatalogCounts,
}

impl CatalogSnapshot {
    /// Inspect every spec once and derive counts
    pub fn capture(catalog: &Catalog, inspector: &StateInspector<'_>) -> Self {
        let mut counts = CatalogCounts {
            all: catalog.len(),
            ..CatalogCounts::default()
        };

        let entries: Vec<SnapshotEntry> = catalog
            .iter()
            .map(|spec| {
                let state = inspector.inspect(spec);
                if spec.featured {
                    counts.featured += 1;
                }
                if spec.required {
                    counts.required += 1;
                }
                match state {
                    PackageState::Active => counts.active += 1,
                    PackageState::Inactive | PackageState::InactiveNeedsUpdate => {
                        counts.inactive += 1
                    }
                    PackageState::NotInstalled => counts.not_installed += 1,
                    PackageState::ActiveNeedsUpdate => {}
                }
                let installed_version = if state.is_installed() {
                    inspector.installed_version(spec)
                } else {
                    None
                };
                SnapshotEntry {
                    spec: spec.clone(),
                    state,
                    installed_version,
                }
            })
            .collect();

        Self { entries, counts }
    }

    pub fn get(&self, slug: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.spec.slug == slug)
    }

    pub fn filtered(&self, filter: CatalogFilter) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries
            .iter()
            .filter(move |e| filter.matches(&e.spec, e.state))
    }

    /// Every package is exactly `Active`
    pub fn all_active(&self) -> bool {
        self.entries.iter().all(|e| e.state == PackageState::Active)
    }

    pub fn needing_update(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter().filter(|e| e.state.needs_update())
    }
}
