//! Notice suppression tests

mod common;

use chrono::Duration;
use common::*;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tether_core::types::NoticeClass;
use tether_packages::guard::NOTICE_MIGRATION_DONE;
use tether_packages::{
    Catalog, CatalogSnapshot, Clock, JsonFileStore, KeyValueStore, ManualClock, NoticeStore, Scope,
    TransientGuard,
};

mod windows {
    use super::*;

    #[test]
    fn test_recommended_window_is_thirty_days() {
        let env = TestEnv::new();
        let notices = env.notices();
        notices
            .dismiss("admin", NoticeClass::RecommendedMissing)
            .unwrap();

        env.clock.advance(Duration::days(29));
        assert!(!notices.should_show("admin", NoticeClass::RecommendedMissing));
        env.clock.advance(Duration::days(1));
        assert!(notices.should_show("admin", NoticeClass::RecommendedMissing));
    }

    #[test]
    fn test_classes_are_independent() {
        let env = TestEnv::new();
        let notices = env.notices();
        notices.dismiss("admin", NoticeClass::RequiredMissing).unwrap();

        assert!(!notices.should_show("admin", NoticeClass::RequiredMissing));
        assert!(notices.should_show("admin", NoticeClass::RecommendedMissing));
        assert!(notices.should_show("admin", NoticeClass::UpdatesAvailable));
    }

    #[test]
    fn test_redismissal_restarts_window() {
        let env = TestEnv::new();
        let notices = env.notices();
        notices.dismiss("admin", NoticeClass::UpdatesAvailable).unwrap();
        env.clock.advance(Duration::days(6));
        notices.dismiss("admin", NoticeClass::UpdatesAvailable).unwrap();
        env.clock.advance(Duration::days(6));
        assert!(!notices.should_show("admin", NoticeClass::UpdatesAvailable));
    }

    #[test]
    fn test_dismissals_persist_on_disk() {
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let open = || {
            NoticeStore::new(
                Arc::new(JsonFileStore::new(temp.path().join("state"))),
                clock.clone(),
            )
        };

        open().dismiss("admin", NoticeClass::RequiredMissing).unwrap();
        assert!(!open().should_show("admin", NoticeClass::RequiredMissing));
        assert!(open().dismissed_at("admin", NoticeClass::RequiredMissing).is_some());
    }

    proptest! {
        #[test]
        fn prop_hidden_exactly_within_window(elapsed_secs in 0i64..(60 * 86_400)) {
            let env = TestEnv::new();
            let notices = env.notices();
            let class = NoticeClass::RecommendedMissing;
            notices.dismiss("admin", class).unwrap();

            env.clock.advance(Duration::seconds(elapsed_secs));
            let shown = notices.should_show("admin", class);
            prop_assert_eq!(shown, Duration::seconds(elapsed_secs) >= Duration::days(30));
        }
    }
}

mod migration {
    use super::*;

    fn seed_legacy(env: &TestEnv, user: &str) {
        for key in [
            "hide_required_plugins_notice",
            "hide_recommended_plugins_notice",
        ] {
            env.store
                .set(Scope::User(user), key, Value::Bool(true))
                .unwrap();
        }
        env.store
            .set(
                Scope::User(user),
                NoticeClass::UpdatesAvailable.storage_key(),
                Value::from(env.clock.now().timestamp()),
            )
            .unwrap();
    }

    #[test]
    fn test_migration_clears_legacy_keys_once() {
        let env = TestEnv::new();
        let notices = env.notices();
        let guard = env.guard();
        seed_legacy(&env, "admin");

        assert!(notices.migrate_legacy("admin", &guard).unwrap());
        assert!(env
            .store
            .get(Scope::User("admin"), "hide_required_plugins_notice")
            .unwrap()
            .is_none());
        assert!(notices.should_show("admin", NoticeClass::UpdatesAvailable));
        assert!(guard.flag(NOTICE_MIGRATION_DONE));

        // Second run leaves new dismissals alone
        notices.dismiss("admin", NoticeClass::UpdatesAvailable).unwrap();
        assert!(!notices.migrate_legacy("admin", &guard).unwrap());
        assert!(!notices.should_show("admin", NoticeClass::UpdatesAvailable));
    }

    #[test]
    fn test_migration_flag_is_global() {
        let env = TestEnv::new();
        let notices = env.notices();
        let guard = env.guard();
        seed_legacy(&env, "second");

        assert!(notices.migrate_legacy("first", &guard).unwrap());
        assert!(!notices.migrate_legacy("second", &guard).unwrap());
        assert!(env
            .store
            .get(Scope::User("second"), "hide_recommended_plugins_notice")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_flag_survives_transient_expiry() {
        let env = TestEnv::new();
        let guard: TransientGuard = env.guard();
        env.notices().migrate_legacy("admin", &guard).unwrap();
        env.clock.advance(Duration::days(365));
        assert!(guard.flag(NOTICE_MIGRATION_DONE));
    }
}

mod pending {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_specs([
            registry_spec("core").as_required(),
            registry_spec("extra"),
            registry_spec("old").with_min_version("2.0"),
        ])
    }

    #[test]
    fn test_pending_notices_follow_state() {
        let env = TestEnv::new();
        env.host.place_active("old/old.php", "1.0");
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());
        let notices = env.notices();

        let pending = notices.pending("admin", &snapshot);
        let classes: Vec<NoticeClass> = pending.iter().map(|n| n.class).collect();
        assert_eq!(
            classes,
            vec![
                NoticeClass::RequiredMissing,
                NoticeClass::RecommendedMissing,
                NoticeClass::UpdatesAvailable
            ]
        );
        assert_eq!(pending[0].slugs, vec!["core".to_string()]);
        assert!(pending[0].message.starts_with("1 required packages"));
        // Active but outdated is not fully converged
        assert_eq!(pending[1].slugs, vec!["extra".to_string(), "old".to_string()]);
        assert_eq!(pending[2].slugs, vec!["old".to_string()]);
    }

    #[test]
    fn test_dismissed_class_is_filtered() {
        let env = TestEnv::new();
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());
        let notices = env.notices();
        notices.dismiss("admin", NoticeClass::RequiredMissing).unwrap();

        let pending = notices.pending("admin", &snapshot);
        assert!(pending
            .iter()
            .all(|n| n.class != NoticeClass::RequiredMissing));
        assert_eq!(notices.pending("other", &snapshot).len(), 2);
    }

    #[test]
    fn test_converged_catalog_has_no_notices() {
        let env = TestEnv::new();
        for slug in ["core", "extra"] {
            env.host.place_active(&entry_for(slug), "1.0");
        }
        env.host.place_active("old/old.php", "2.0");
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());

        assert!(env.notices().pending("admin", &snapshot).is_empty());
    }
}
