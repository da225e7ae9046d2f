//! Operation surface for UI and CLI layers
//!
//! Every mutating operation checks the caller's capability first and
//! returns `Err(PermissionDenied)` before touching anything. All other
//! failures come back as an [`Envelope`] with `success: false` and a
//! human-readable message.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tether_core::config::HierarchicalConfigLoader;
use tether_core::types::{ConvergenceConfig, NoticeClass, PackageSpec, RuntimeConfig};
use tether_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::archive::ArchiveExtractor;
use crate::catalog::{Catalog, CatalogBuilder, CatalogProvider, CatalogSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::fs_host::FsHost;
use crate::guard::{TransientGuard, APPLICATION_SWITCHED, PACKAGES_INSTALLED};
use crate::notices::{NoticeStore, NoticeTtls, PendingNotice};
use crate::reconcile::{ReconciliationEngine, ReconciliationResult};
use crate::remote::RegistryClient;
use crate::store::{JsonFileStore, KeyValueStore};

/// Permission required for a class of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    InstallPackages,
    ActivatePackages,
    UpdatePackages,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::InstallPackages,
        Capability::ActivatePackages,
        Capability::UpdatePackages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::InstallPackages => "install_packages",
            Capability::ActivatePackages => "activate_packages",
            Capability::UpdatePackages => "update_packages",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity and capabilities of whoever triggered an operation
#[derive(Debug, Clone)]
pub struct Caller {
    user_id: String,
    capabilities: HashSet<Capability>,
}

impl Caller {
    /// A caller with no capabilities
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            capabilities: HashSet::new(),
        }
    }

    /// A caller with every capability
    pub fn administrator(user_id: impl Into<String>) -> Self {
        Capability::ALL
            .into_iter()
            .fold(Self::new(user_id), Self::with_capability)
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            warn!("{} lacks {}", self.user_id, capability);
            Err(Error::permission_denied(capability.as_str()))
        }
    }
}

/// Success/failure reply of a transport operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ReconciliationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_active: Option<bool>,
}

impl Envelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            results: None,
            all_active: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }

    /// Bulk reply; success only when every package succeeded
    fn bulk(result: ReconciliationResult, all_ok: String, partial: String) -> Self {
        let mut envelope = if result.is_success() {
            Self::success(all_ok)
        } else {
            Self::failure(partial)
        };
        envelope.results = Some(result);
        envelope
    }
}

pub struct PackageService {
    engine: ReconciliationEngine,
    catalog: CatalogBuilder,
    notices: NoticeStore,
    guard: TransientGuard,
    convergence: ConvergenceConfig,
}

impl PackageService {
    pub fn new(
        engine: ReconciliationEngine,
        catalog: CatalogBuilder,
        notices: NoticeStore,
        guard: TransientGuard,
        convergence: ConvergenceConfig,
    ) -> Self {
        Self {
            engine,
            catalog,
            notices,
            guard,
            convergence,
        }
    }

    /// Wire the filesystem host, registry client and state store from configuration
    pub fn from_config(
        loader: &HierarchicalConfigLoader,
        config: &RuntimeConfig,
    ) -> anyhow::Result<Self> {
        let paths = &config.paths;
        let extractor = Arc::new(ArchiveExtractor::from_config(&config.extraction)?);
        let state = JsonFileStore::new(&paths.state_dir);
        let registry = RegistryClient::new(&config.registry)?;
        let host = Arc::new(FsHost::new(
            &paths.packages_dir,
            state.clone(),
            registry,
            extractor.clone(),
        ));

        let store: Arc<dyn KeyValueStore> = Arc::new(state);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        debug!(
            "Package root {}, state {}, strategies {:?}",
            paths.packages_dir.display(),
            paths.state_dir.display(),
            extractor.strategy_names()
        );

        Ok(Self::new(
            ReconciliationEngine::new(host, extractor, &paths.archive_dir),
            CatalogBuilder::from_config(loader, config)?,
            NoticeStore::new(store.clone(), clock.clone())
                .with_ttls(NoticeTtls::from_config(&config.notices)?),
            TransientGuard::new(store, clock),
            config.convergence.clone(),
        ))
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn notices(&self) -> &NoticeStore {
        &self.notices
    }

    /// Add a catalog provider after every configured one
    pub fn register_provider(&mut self, name: impl Into<String>, provider: CatalogProvider) {
        self.catalog.register(name, provider);
    }

    /// Catalog for this pass
    pub fn catalog(&self) -> Catalog {
        self.catalog.build()
    }

    /// Catalog with freshly inspected states and filter counts
    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot::capture(&self.catalog(), &self.engine.inspector())
    }

    /// Catalog entry for `slug`
    pub fn package(&self, slug: &str) -> Result<PackageSpec> {
        self.catalog()
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::unknown_package(slug))
    }

    /// Install one package without activating it
    pub fn install_one(&self, caller: &Caller, slug: &str) -> Result<Envelope> {
        caller.require(Capability::InstallPackages)?;
        let spec = match self.package(slug) {
            Ok(spec) => spec,
            Err(e) => {
                debug!("{}", e);
                return Ok(Envelope::failure("Package not found in catalog."));
            }
        };

        let envelope = match (self.engine.try_install(&spec), spec.is_local()) {
            (Ok(()), true) => Envelope::success("Local package installed successfully."),
            (Ok(()), false) => Envelope::success("Package installed successfully."),
            (Err(Error::NotFound { .. }), true) => Envelope::failure(
                "Local package archive not found. Please ensure the archive exists in the archive directory.",
            ),
            (Err(Error::HostPrimitive { ref operation, .. }), false)
                if operation == "fetch metadata" =>
            {
                Envelope::failure("Package information could not be retrieved.")
            }
            (Err(e), true) => Envelope::failure(format!("Local package installation failed: {}", e)),
            (Err(e), false) => Envelope::failure(format!("Package installation failed: {}", e)),
        };
        Ok(envelope)
    }

    pub fn activate_one(&self, caller: &Caller, slug: &str) -> Result<Envelope> {
        caller.require(Capability::ActivatePackages)?;
        let spec = match self.package(slug) {
            Ok(spec) => spec,
            Err(e) => {
                debug!("{}", e);
                return Ok(Envelope::failure("Package not found in catalog."));
            }
        };

        Ok(match self.engine.try_activate(&spec) {
            Ok(()) => Envelope::success("Package activated successfully."),
            Err(e) => Envelope::failure(e.to_string()),
        })
    }

    pub fn update_one(&self, caller: &Caller, slug: &str) -> Result<Envelope> {
        caller.require(Capability::UpdatePackages)?;
        let spec = match self.package(slug) {
            Ok(spec) => spec,
            Err(e) => {
                debug!("{}", e);
                return Ok(Envelope::failure("Package not found."));
            }
        };

        Ok(match (self.engine.try_update(&spec), spec.is_local()) {
            (Ok(()), true) => Envelope::success("Local package updated successfully."),
            (Ok(()), false) => Envelope::success("Package updated successfully."),
            (Err(e), true) => Envelope::failure(format!("Failed to update local package: {}", e)),
            (Err(e), false) => Envelope::failure(format!("Failed to update package: {}", e)),
        })
    }

    pub fn install_required(&self, caller: &Caller) -> Result<Envelope> {
        caller.require(Capability::InstallPackages)?;
        let result = self.engine.bulk_converge(&self.catalog().required());
        Ok(Envelope::bulk(
            result.clone(),
            format!(
                "{} required packages installed and activated successfully.",
                result.success_count
            ),
            format!(
                "{} of {} required packages installed successfully.",
                result.success_count, result.total_count
            ),
        ))
    }

    /// Converge the whole catalog, required packages included
    pub fn install_recommended(&self, caller: &Caller) -> Result<Envelope> {
        caller.require(Capability::InstallPackages)?;
        let result = self.engine.bulk_converge(self.catalog().specs());
        Ok(Envelope::bulk(
            result.clone(),
            format!(
                "{} recommended packages installed and activated successfully.",
                result.success_count
            ),
            format!(
                "{} of {} recommended packages installed successfully.",
                result.success_count, result.total_count
            ),
        ))
    }

    /// Update every package currently in a needs-update state
    pub fn update_all(&self, caller: &Caller) -> Result<Envelope> {
        caller.require(Capability::UpdatePackages)?;
        let outdated: Vec<PackageSpec> = self
            .snapshot()
            .needing_update()
            .map(|e| e.spec.clone())
            .collect();
        let result = self.engine.bulk_update(&outdated);
        Ok(Envelope::bulk(
            result.clone(),
            format!("{} packages updated successfully.", result.success_count),
            format!(
                "{} of {} packages updated successfully.",
                result.success_count, result.total_count
            ),
        ))
    }

    pub fn check_recommended(&self) -> Envelope {
        let all_active = self.snapshot().all_active();
        let mut envelope = Envelope::success(if all_active {
            "All recommended packages are active!"
        } else {
            "Some recommended packages are not active."
        });
        envelope.all_active = Some(all_active);
        envelope
    }

    pub fn dismiss(&self, caller: &Caller, class: NoticeClass) -> Envelope {
        self.migrate_notices(caller);
        match self.notices.dismiss(caller.user_id(), class) {
            Ok(()) => Envelope::success(format!("{} notice dismissed.", class)),
            Err(e) => Envelope::failure(format!("Failed to dismiss {} notice: {:#}", class, e)),
        }
    }

    /// One-time cleanup of dismissals from the earlier scheme
    pub fn migrate_notices(&self, caller: &Caller) -> bool {
        match self.notices.migrate_legacy(caller.user_id(), &self.guard) {
            Ok(ran) => ran,
            Err(e) => {
                warn!("Notice migration failed: {:#}", e);
                false
            }
        }
    }

    pub fn pending_notices(&self, caller: &Caller) -> Vec<PendingNotice> {
        self.migrate_notices(caller);
        self.notices.pending(caller.user_id(), &self.snapshot())
    }

    /// Rate-limited sweep over required packages
    ///
    /// `None` when the caller may not install or a sweep ran recently.
    pub fn sweep(&self, caller: &Caller) -> Option<ReconciliationResult> {
        if !caller.can(Capability::InstallPackages) {
            return None;
        }
        let interval = self.convergence.check_interval();
        self.engine
            .sweep_required(&self.catalog().required(), &self.guard, interval)
    }

    /// Install and activate required packages after the parent application is switched in
    pub fn on_switch(&self, caller: &Caller) -> Option<ReconciliationResult> {
        if !caller.can(Capability::InstallPackages) {
            return None;
        }
        let required = self.catalog().required();
        if required.is_empty() {
            return None;
        }

        let switch_ttl = self.convergence.switch_marker();
        if let Err(e) = self.guard.set(APPLICATION_SWITCHED, switch_ttl) {
            warn!("Failed to set switch marker: {:#}", e);
        }

        let result = self.engine.bulk_converge(&required);

        let installed_ttl = self.convergence.installed_marker();
        if let Err(e) = self.guard.set(PACKAGES_INSTALLED, installed_ttl) {
            warn!("Failed to set installed marker: {:#}", e);
        }
        info!(
            "Switch install: {} of {} required packages active",
            result.success_count, result.total_count
        );
        Some(result)
    }

    /// Whether the post-switch install marker is still live
    pub fn recently_installed(&self) -> bool {
        self.guard.is_set(PACKAGES_INSTALLED)
    }
}
