//! Time-boxed markers and one-shot flags
//!
//! A marker is stored as its expiry timestamp (unix seconds) in the global
//! scope and reads as unset once the clock passes it. Flags never expire.

use anyhow::{anyhow, Result};
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::store::{KeyValueStore, Scope};

/// Set while a required-package sweep has run recently
pub const PACKAGES_CHECKED: &str = "packages_checked";

/// Set briefly when the parent application is switched in
pub const APPLICATION_SWITCHED: &str = "theme_activated";

/// Set after the switch-triggered install pass completes
pub const PACKAGES_INSTALLED: &str = "packages_installed";

/// Global flag recording that legacy dismissal keys were cleaned up
pub const NOTICE_MIGRATION_DONE: &str = "notice_migration_done";

#[derive(Clone)]
pub struct TransientGuard {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl TransientGuard {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Whether `key` is set and not yet expired
    ///
    /// Unreadable storage reads as unset.
    pub fn is_set(&self, key: &str) -> bool {
        match self.store.get(Scope::Global, key) {
            Ok(Some(value)) => value
                .as_i64()
                .is_some_and(|expires| expires > self.clock.now().timestamp()),
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read marker '{}': {}", key, e);
                false
            }
        }
    }

    /// Set `key` for `ttl`; a lifetime past the representable range is an error
    pub fn set(&self, key: &str, ttl: Duration) -> Result<()> {
        let expires = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Marker '{}' lifetime of {} is out of range", key, ttl))?
            .timestamp();
        debug!("Setting marker '{}' until {}", key, expires);
        self.store.set(Scope::Global, key, Value::from(expires))
    }

    pub fn clear(&self, key: &str) -> Result<()> {
        self.store.delete(Scope::Global, key)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.store.get(Scope::Global, key), Ok(Some(Value::Bool(true))))
    }

    pub fn set_flag(&self, key: &str) -> Result<()> {
        self.store.set(Scope::Global, key, Value::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn guard() -> (TransientGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let guard = TransientGuard::new(Arc::new(MemoryStore::new()), clock.clone());
        (guard, clock)
    }

    #[test]
    fn test_marker_expires() {
        let (guard, clock) = guard();
        assert!(!guard.is_set(PACKAGES_CHECKED));

        guard.set(PACKAGES_CHECKED, Duration::hours(1)).unwrap();
        assert!(guard.is_set(PACKAGES_CHECKED));

        clock.advance(Duration::minutes(59));
        assert!(guard.is_set(PACKAGES_CHECKED));

        clock.advance(Duration::minutes(1));
        assert!(!guard.is_set(PACKAGES_CHECKED));
    }

    #[test]
    fn test_clear_removes_marker() {
        let (guard, _) = guard();
        guard.set(APPLICATION_SWITCHED, Duration::seconds(30)).unwrap();
        guard.clear(APPLICATION_SWITCHED).unwrap();
        assert!(!guard.is_set(APPLICATION_SWITCHED));
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let (guard, _) = guard();
        let err = guard.set(PACKAGES_CHECKED, Duration::MAX).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(!guard.is_set(PACKAGES_CHECKED));
    }

    #[test]
    fn test_flags_do_not_expire() {
        let (guard, clock) = guard();
        assert!(!guard.flag(NOTICE_MIGRATION_DONE));
        guard.set_flag(NOTICE_MIGRATION_DONE).unwrap();
        clock.advance(Duration::days(10_000));
        assert!(guard.flag(NOTICE_MIGRATION_DONE));
    }
}
