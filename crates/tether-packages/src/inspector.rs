//! Lifecycle state computation
//!
//! [`StateInspector::inspect`] is a pure read of host-reported data: the
//! active flag, on-disk presence and installed version. It never mutates
//! the package declaration or the host.

use tether_core::types::{PackageSpec, PackageState};
use tether_core::version::is_older_than;
use tracing::{debug, warn};

use crate::host::HostRegistry;

pub struct StateInspector<'a> {
    host: &'a dyn HostRegistry,
}

impl<'a> StateInspector<'a> {
    pub fn new(host: &'a dyn HostRegistry) -> Self {
        Self { host }
    }

    /// Compute the lifecycle state of `spec`
    pub fn inspect(&self, spec: &PackageSpec) -> PackageState {
        let active = match self.host.is_active(&spec.entry_point) {
            Ok(active) => active,
            Err(e) => {
                warn!(
                    "Could not read host state for {} ({}), treating as not installed: {}",
                    spec.slug, spec.entry_point, e
                );
                return PackageState::NotInstalled;
            }
        };

        if active {
            if self.is_outdated(spec) {
                PackageState::ActiveNeedsUpdate
            } else {
                PackageState::Active
            }
        } else if self.host.is_present(&spec.entry_point) {
            if self.is_outdated(spec) {
                PackageState::InactiveNeedsUpdate
            } else {
                PackageState::Inactive
            }
        } else {
            PackageState::NotInstalled
        }
    }

    /// Installed version as reported by the host, if readable
    pub fn installed_version(&self, spec: &PackageSpec) -> Option<String> {
        match self.host.installed_version(&spec.entry_point) {
            Ok(version) => version.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                debug!("Installed version of {} unreadable: {}", spec.slug, e);
                None
            }
        }
    }

    /// True only when both versions are known and installed < minimum
    ///
    /// An unknown or unparseable installed version skips the check.
    fn is_outdated(&self, spec: &PackageSpec) -> bool {
        let Some(minimum) = spec.min_version() else {
            return false;
        };
        let Some(installed) = self.installed_version(spec) else {
            debug!(
                "Cannot determine installed version of {}, skipping update check",
                spec.slug
            );
            return false;
        };
        is_older_than(&installed, minimum).unwrap_or(false)
    }
}
