//! Notice suppression
//!
//! Each (user, notice class) pair remembers when it was last dismissed.
//! A notice shows again once its class's window has elapsed: 7 days for
//! missing required packages and available updates, 30 days for missing
//! recommended packages.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tether_core::types::{NoticeClass, NoticeConfig, PackageState};
use tracing::{debug, info, warn};

use crate::catalog::CatalogSnapshot;
use crate::clock::Clock;
use crate::guard::{TransientGuard, NOTICE_MIGRATION_DONE};
use crate::store::{KeyValueStore, Scope};

/// Per-user keys written by the earlier boolean dismissal scheme
const LEGACY_DISMISSAL_KEYS: [&str; 2] = [
    "hide_required_plugins_notice",
    "hide_recommended_plugins_notice",
];

/// Suppression window per notice class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticeTtls {
    pub required: Duration,
    pub recommended: Duration,
    pub updates: Duration,
}

impl NoticeTtls {
    pub fn from_config(config: &NoticeConfig) -> Result<Self> {
        let days = |name: &str, value: i64| {
            Duration::try_days(value)
                .ok_or_else(|| anyhow!("{} of {} days is out of range", name, value))
        };
        Ok(Self {
            required: days("required-ttl-days", config.required_ttl_days)?,
            recommended: days("recommended-ttl-days", config.recommended_ttl_days)?,
            updates: days("updates-ttl-days", config.updates_ttl_days)?,
        })
    }

    pub fn get(&self, class: NoticeClass) -> Duration {
        match class {
            NoticeClass::RequiredMissing => self.required,
            NoticeClass::RecommendedMissing => self.recommended,
            NoticeClass::UpdatesAvailable => self.updates,
        }
    }
}

impl Default for NoticeTtls {
    fn default() -> Self {
        Self {
            required: NoticeClass::RequiredMissing.default_ttl(),
            recommended: NoticeClass::RecommendedMissing.default_ttl(),
            updates: NoticeClass::UpdatesAvailable.default_ttl(),
        }
    }
}

/// A notice that should be surfaced to a user right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingNotice {
    pub class: NoticeClass,
    pub slugs: Vec<String>,
    pub message: String,
}

#[derive(Clone)]
pub struct NoticeStore {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttls: NoticeTtls,
}

impl NoticeStore {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttls: NoticeTtls::default(),
        }
    }

    pub fn with_ttls(mut self, ttls: NoticeTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn ttls(&self) -> &NoticeTtls {
        &self.ttls
    }

    /// When `user` last dismissed `class`, if ever
    pub fn dismissed_at(&self, user: &str, class: NoticeClass) -> Option<DateTime<Utc>> {
        match self.store.get(Scope::User(user), class.storage_key()) {
            Ok(Some(value)) => value
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read dismissal for {} ({}): {}", user, class, e);
                None
            }
        }
    }

    /// Whether `class` should be shown to `user`
    ///
    /// True when never dismissed or when the dismissal is at least one
    /// window old.
    pub fn should_show(&self, user: &str, class: NoticeClass) -> bool {
        match self.dismissed_at(user, class) {
            Some(dismissed) => self.clock.now() - dismissed >= self.ttls.get(class),
            None => true,
        }
    }

    /// Record a dismissal at the current time, replacing any earlier one
    pub fn dismiss(&self, user: &str, class: NoticeClass) -> Result<()> {
        let now = self.clock.now().timestamp();
        debug!("User {} dismissed {} notice", user, class);
        self.store
            .set(Scope::User(user), class.storage_key(), Value::from(now))
    }

    /// Clear dismissals left by the earlier scheme, once per installation
    ///
    /// Returns whether the migration ran.
    pub fn migrate_legacy(&self, user: &str, guard: &TransientGuard) -> Result<bool> {
        if guard.flag(NOTICE_MIGRATION_DONE) {
            return Ok(false);
        }

        for key in LEGACY_DISMISSAL_KEYS {
            self.store.delete(Scope::User(user), key)?;
        }
        self.store.delete(
            Scope::User(user),
            NoticeClass::UpdatesAvailable.storage_key(),
        )?;

        guard.set_flag(NOTICE_MIGRATION_DONE)?;
        info!("Migrated legacy notice dismissals");
        Ok(true)
    }

    /// Notices `user` should see for the given catalog state
    pub fn pending(&self, user: &str, snapshot: &CatalogSnapshot) -> Vec<PendingNotice> {
        let mut notices = Vec::new();

        let missing_required = slugs_where(snapshot, |e| {
            e.spec.required && e.state != PackageState::Active
        });
        if !missing_required.is_empty() && self.should_show(user, NoticeClass::RequiredMissing) {
            notices.push(PendingNotice {
                class: NoticeClass::RequiredMissing,
                message: format!(
                    "{} required packages are missing. Please install them for full functionality.",
                    missing_required.len()
                ),
                slugs: missing_required,
            });
        }

        let missing_recommended = slugs_where(snapshot, |e| {
            !e.spec.required && e.state != PackageState::Active
        });
        if !missing_recommended.is_empty()
            && self.should_show(user, NoticeClass::RecommendedMissing)
        {
            notices.push(PendingNotice {
                class: NoticeClass::RecommendedMissing,
                message: format!(
                    "We recommend {} additional packages to enhance your experience.",
                    missing_recommended.len()
                ),
                slugs: missing_recommended,
            });
        }

        let outdated = slugs_where(snapshot, |e| e.state.needs_update());
        if !outdated.is_empty() && self.should_show(user, NoticeClass::UpdatesAvailable) {
            notices.push(PendingNotice {
                class: NoticeClass::UpdatesAvailable,
                message: format!(
                    "{} packages have updates available. Keep your packages up to date for better security and performance.",
                    outdated.len()
                ),
                slugs: outdated,
            });
        }

        notices
    }
}

fn slugs_where<F>(snapshot: &CatalogSnapshot, pred: F) -> Vec<String>
where
    F: Fn(&crate::catalog::SnapshotEntry) -> bool,
{
    snapshot
        .entries
        .iter()
        .filter(|e| pred(e))
        .map(|e| e.spec.slug.clone())
        .collect()
}
