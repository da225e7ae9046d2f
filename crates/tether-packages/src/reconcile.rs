//! Reconciliation engine
//!
//! Drives declared packages toward installed + active. Every host call is a
//! failure boundary: errors are logged and turned into a `false` / `Failed`
//! outcome so one broken package never aborts a bulk pass.
//!
//! Mutations are strictly sequential. The package root and the host's
//! activation registry are not safe for concurrent writers, and every
//! operation re-inspects state before acting, so an interrupted pass can
//! simply be run again.

use chrono::Duration;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tether_core::types::{PackageSpec, PackageState};
use tether_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::archive::ArchiveExtractor;
use crate::guard::{TransientGuard, PACKAGES_CHECKED};
use crate::host::HostRegistry;
use crate::inspector::StateInspector;
use crate::locator::PackageLocator;

/// What happened to one package during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageOutcome {
    AlreadyActive,
    InstalledAndActivated,
    /// Installed but inactive; activation alone brought it up
    Activated,
    Updated,
    /// Left alone by a pass that does not handle its state
    Skipped,
    Failed,
}

impl PackageOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PackageOutcome::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageOutcome::AlreadyActive => "already-active",
            PackageOutcome::InstalledAndActivated => "installed-and-activated",
            PackageOutcome::Activated => "activated",
            PackageOutcome::Updated => "updated",
            PackageOutcome::Skipped => "skipped",
            PackageOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PackageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall verdict of a bulk pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    PartialFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageResult {
    pub slug: String,
    pub outcome: PackageOutcome,
}

/// Per-package outcomes of a bulk pass, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub results: Vec<PackageResult>,
    pub success_count: usize,
    pub total_count: usize,
}

impl ReconciliationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, slug: impl Into<String>, outcome: PackageOutcome) {
        self.total_count += 1;
        if outcome.is_success() {
            self.success_count += 1;
        }
        self.results.push(PackageResult {
            slug: slug.into(),
            outcome,
        });
    }

    pub fn outcome(&self) -> Outcome {
        if self.success_count == self.total_count {
            Outcome::Success
        } else {
            Outcome::PartialFailure
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Outcome::Success
    }

    pub fn failed_count(&self) -> usize {
        self.total_count - self.success_count
    }

    pub fn get(&self, slug: &str) -> Option<PackageOutcome> {
        self.results
            .iter()
            .find(|r| r.slug == slug)
            .map(|r| r.outcome)
    }

    pub fn failed_slugs(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == PackageOutcome::Failed)
            .map(|r| r.slug.as_str())
            .collect()
    }

    /// `PartialConvergence` when anything failed
    pub fn into_error(self) -> Option<Error> {
        match self.outcome() {
            Outcome::Success => None,
            Outcome::PartialFailure => Some(Error::PartialConvergence {
                succeeded: self.success_count,
                total: self.total_count,
            }),
        }
    }
}

pub struct ReconciliationEngine {
    host: Arc<dyn HostRegistry>,
    extractor: Arc<ArchiveExtractor>,
    locator: PackageLocator,
    archive_dir: PathBuf,
}

impl ReconciliationEngine {
    /// `archive_dir` holds `<slug>.zip` for local packages without an explicit archive
    pub fn new(
        host: Arc<dyn HostRegistry>,
        extractor: Arc<ArchiveExtractor>,
        archive_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            extractor,
            locator: PackageLocator::new(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn host(&self) -> &dyn HostRegistry {
        self.host.as_ref()
    }

    pub fn inspector(&self) -> StateInspector<'_> {
        StateInspector::new(self.host.as_ref())
    }

    pub fn state(&self, spec: &PackageSpec) -> PackageState {
        self.inspector().inspect(spec)
    }

    /// Archive path for a local package
    pub fn resolve_archive(&self, spec: &PackageSpec) -> Result<PathBuf> {
        let path = spec
            .archive
            .clone()
            .unwrap_or_else(|| self.archive_dir.join(format!("{}.zip", spec.slug)));
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::not_found(format!(
                "local archive for {} at {}",
                spec.slug,
                path.display()
            )))
        }
    }

    /// Install without activating
    pub fn try_install(&self, spec: &PackageSpec) -> Result<()> {
        if spec.is_local() {
            self.install_local(spec)
        } else {
            self.install_registry(spec)
        }
    }

    pub fn install(&self, spec: &PackageSpec) -> bool {
        report(spec, "install", self.try_install(spec))
    }

    fn install_local(&self, spec: &PackageSpec) -> Result<()> {
        let archive = self.resolve_archive(spec)?;

        if self.host.is_present(&spec.entry_point) {
            debug!("{} already on disk, skipping extraction", spec.slug);
            return Ok(());
        }

        let root = self.host.package_root();
        ensure_writable(root).map_err(|e| {
            Error::host_primitive("install", &spec.slug, format!("{}: {}", root.display(), e))
        })?;

        let strategy = self.extractor.try_extract(spec, &archive, root)?;
        info!("Installed {} from {} ({})", spec.slug, archive.display(), strategy);
        Ok(())
    }

    fn install_registry(&self, spec: &PackageSpec) -> Result<()> {
        let metadata = self
            .host
            .fetch_metadata(&spec.slug)
            .map_err(|e| Error::host_primitive("fetch metadata", &spec.slug, format!("{:#}", e)))?;

        self.host
            .install(&metadata.download_link)
            .map_err(|e| Error::host_primitive("install", &spec.slug, format!("{:#}", e)))?;

        if !self.host.is_present(&spec.entry_point)
            && !self.locator.locate(spec, self.host.package_root())
        {
            return Err(Error::host_primitive(
                "install",
                &spec.slug,
                format!("{} missing after install", spec.entry_point),
            ));
        }

        info!("Installed {} {} from registry", spec.slug, metadata.version);
        Ok(())
    }

    pub fn try_activate(&self, spec: &PackageSpec) -> Result<()> {
        self.host
            .activate(&spec.entry_point)
            .map_err(|e| Error::host_primitive("activate", &spec.slug, format!("{:#}", e)))
    }

    pub fn activate(&self, spec: &PackageSpec) -> bool {
        report(spec, "activate", self.try_activate(spec))
    }

    /// Converge one package to `Active`
    ///
    /// A no-op when already `Active`. Activation is not attempted when the
    /// install step fails.
    pub fn try_install_and_activate(&self, spec: &PackageSpec) -> Result<()> {
        match self.state(spec) {
            PackageState::Active => return Ok(()),
            PackageState::NotInstalled => self.try_install(spec)?,
            _ => {}
        }
        self.try_activate(spec)
    }

    pub fn install_and_activate(&self, spec: &PackageSpec) -> bool {
        report(spec, "install and activate", self.try_install_and_activate(spec))
    }

    /// Re-apply a package at its latest available version
    ///
    /// Local packages are deactivated, deleted, re-extracted and reactivated.
    /// The deletion is not undone if extraction then fails.
    pub fn try_update(&self, spec: &PackageSpec) -> Result<()> {
        if !spec.is_local() {
            return self
                .host
                .upgrade(&spec.entry_point)
                .map_err(|e| Error::host_primitive("upgrade", &spec.slug, format!("{:#}", e)));
        }

        let archive = self.resolve_archive(spec)?;

        match self.host.is_active(&spec.entry_point) {
            Ok(true) => {
                if let Err(e) = self.host.deactivate(&spec.entry_point) {
                    warn!("Failed to deactivate {} before update: {:#}", spec.slug, e);
                }
            }
            Ok(false) => {}
            Err(e) => debug!("Active flag of {} unreadable: {:#}", spec.slug, e),
        }

        let root = self.host.package_root();
        remove_existing(root, spec)?;

        let strategy = self.extractor.try_extract(spec, &archive, root)?;
        info!("Re-extracted {} with {}", spec.slug, strategy);

        self.try_activate(spec)
    }

    pub fn update_package(&self, spec: &PackageSpec) -> bool {
        report(spec, "update", self.try_update(spec))
    }

    /// Converge every spec, reporting in input order
    pub fn bulk_converge(&self, specs: &[PackageSpec]) -> ReconciliationResult {
        let mut result = ReconciliationResult::new();
        for spec in specs {
            let outcome = if self.state(spec) == PackageState::Active {
                PackageOutcome::AlreadyActive
            } else if self.install_and_activate(spec) {
                PackageOutcome::InstalledAndActivated
            } else {
                PackageOutcome::Failed
            };
            debug!("{}: {}", spec.slug, outcome);
            result.record(&spec.slug, outcome);
        }
        info!(
            "Converged {} of {} packages",
            result.success_count, result.total_count
        );
        result
    }

    /// Update every spec, reporting in input order
    pub fn bulk_update(&self, specs: &[PackageSpec]) -> ReconciliationResult {
        let mut result = ReconciliationResult::new();
        for spec in specs {
            let outcome = if self.update_package(spec) {
                PackageOutcome::Updated
            } else {
                PackageOutcome::Failed
            };
            result.record(&spec.slug, outcome);
        }
        info!(
            "Updated {} of {} packages",
            result.success_count, result.total_count
        );
        result
    }

    /// Periodic sweep over required packages
    ///
    /// Returns `None` when a sweep already ran within `interval`. The guard
    /// is set before any package is touched. Missing packages are installed
    /// and activated, inactive ones only activated; outdated ones are left
    /// to the update path.
    pub fn sweep_required(
        &self,
        required: &[PackageSpec],
        guard: &TransientGuard,
        interval: Duration,
    ) -> Option<ReconciliationResult> {
        if guard.is_set(PACKAGES_CHECKED) {
            debug!("Required packages checked recently, skipping sweep");
            return None;
        }
        if let Err(e) = guard.set(PACKAGES_CHECKED, interval) {
            warn!("Failed to record required-package sweep: {:#}", e);
        }

        let mut result = ReconciliationResult::new();
        for spec in required {
            let outcome = match self.state(spec) {
                PackageState::NotInstalled => {
                    if self.install_and_activate(spec) {
                        PackageOutcome::InstalledAndActivated
                    } else {
                        PackageOutcome::Failed
                    }
                }
                PackageState::Inactive => {
                    if self.activate(spec) {
                        PackageOutcome::Activated
                    } else {
                        PackageOutcome::Failed
                    }
                }
                PackageState::Active | PackageState::ActiveNeedsUpdate => {
                    PackageOutcome::AlreadyActive
                }
                PackageState::InactiveNeedsUpdate => PackageOutcome::Skipped,
            };
            result.record(&spec.slug, outcome);
        }
        Some(result)
    }
}

/// Log a failed operation and collapse it to a flag
fn report(spec: &PackageSpec, operation: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to {} {}: {}", operation, spec.slug, e);
            false
        }
    }
}

/// Probe that the package root accepts new files
fn ensure_writable(root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(root)?;
    tempfile::Builder::new()
        .prefix(".tether-write-probe")
        .tempfile_in(root)
        .map(drop)
}

/// Delete the installed copy of `spec` under `root`
fn remove_existing(root: &Path, spec: &PackageSpec) -> Result<()> {
    match spec.install_dir() {
        Some(dir) => {
            let dir = root.join(dir);
            if dir.is_dir() {
                debug!("Removing {}", dir.display());
                fs::remove_dir_all(&dir)?;
            }
        }
        None => {
            let file = root.join(&spec.entry_point);
            if file.is_file() {
                fs::remove_file(&file)?;
            }
        }
    }
    Ok(())
}
