//! Catalog assembly and snapshot tests

mod common;

use camino::Utf8PathBuf;
use common::*;
use std::fs;
use tempfile::TempDir;
use tether_core::config::HierarchicalConfigLoader;
use tether_core::types::{CatalogOverlay, PackageSpec, PackageState, RuntimeConfig};
use tether_packages::{Catalog, CatalogBuilder, CatalogFilter, CatalogSnapshot};

mod providers {
    use super::*;

    #[test]
    fn test_later_provider_overrides_earlier_entry() {
        let mut builder = CatalogBuilder::new(vec![registry_spec("a"), registry_spec("b")]);
        builder.register_overlay(
            "bundle",
            CatalogOverlay {
                packages: vec![
                    registry_spec("b").with_min_version("2.0").as_required(),
                    registry_spec("c"),
                ],
                remove: vec![],
            },
        );

        let catalog = builder.build();
        assert_eq!(catalog.slugs(), vec!["a", "b", "c"]);
        let b = catalog.get("b").unwrap();
        assert!(b.required);
        assert_eq!(b.min_version(), Some("2.0"));
    }

    #[test]
    fn test_closure_provider_sees_accumulated_catalog() {
        let mut builder = CatalogBuilder::new(vec![registry_spec("a")]);
        builder.register_overlay(
            "extras",
            CatalogOverlay {
                packages: vec![registry_spec("b")],
                remove: vec![],
            },
        );
        builder.register(
            "require-everything",
            Box::new(|catalog: Catalog| {
                Catalog::from_specs(catalog.iter().cloned().map(PackageSpec::as_required))
            }),
        );

        assert_eq!(builder.build().required().len(), 2);
    }

    #[test]
    fn test_overlay_removal() {
        let mut builder = CatalogBuilder::new(vec![registry_spec("a"), registry_spec("b")]);
        builder.register_overlay(
            "prune",
            CatalogOverlay {
                packages: vec![],
                remove: vec!["a".into(), "not-there".into()],
            },
        );
        assert_eq!(builder.build().slugs(), vec!["b"]);
    }
}

mod configuration {
    use super::*;

    fn utf8(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_base_file_and_overlays_in_name_order() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("catalog.yaml");
        fs::write(
            &base,
            r#"
packages:
  - slug: forms
    name: Forms
    entry-point: forms/forms.php
  - slug: seo
    name: SEO
    file: seo/seo.php
"#,
        )
        .unwrap();

        let overlays = temp.path().join("catalog.d");
        fs::create_dir_all(&overlays).unwrap();
        fs::write(
            overlays.join("20-final.yaml"),
            "packages:\n  - slug: forms\n    name: Forms Pro\n    entry-point: forms/forms.php\n",
        )
        .unwrap();
        fs::write(
            overlays.join("10-first.yaml"),
            "packages:\n  - slug: forms\n    name: Forms Lite\n    entry-point: forms/forms.php\nremove: [seo]\n",
        )
        .unwrap();
        fs::write(overlays.join("notes.txt"), "ignored").unwrap();

        let mut config = RuntimeConfig::default();
        config.catalog.base = Some(base);
        config.catalog.overlays = Some(overlays);

        let loader = HierarchicalConfigLoader::with_dir(utf8(&temp));
        let builder = CatalogBuilder::from_config(&loader, &config).unwrap();
        assert_eq!(builder.provider_names(), vec!["10-first", "20-final"]);

        let catalog = builder.build();
        assert_eq!(catalog.slugs(), vec!["forms"]);
        assert_eq!(catalog.get("forms").unwrap().name, "Forms Pro");
    }

    #[test]
    fn test_embedded_base_catalog() {
        let temp = TempDir::new().unwrap();
        let loader = HierarchicalConfigLoader::with_dir(utf8(&temp));
        let catalog = CatalogBuilder::from_config(&loader, &RuntimeConfig::default())
            .unwrap()
            .build();
        assert!(!catalog.is_empty());
        assert!(catalog.iter().all(|spec| !spec.entry_point.is_empty()));
    }

    #[test]
    fn test_missing_base_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut config = RuntimeConfig::default();
        config.catalog.base = Some(temp.path().join("absent.yaml"));

        let loader = HierarchicalConfigLoader::with_dir(utf8(&temp));
        assert!(CatalogBuilder::from_config(&loader, &config).is_err());
    }
}

mod snapshots {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_specs([
            registry_spec("active").as_featured(),
            registry_spec("stale").with_min_version("2.0"),
            registry_spec("idle").as_required(),
            registry_spec("idle-old").with_min_version("2.0"),
            registry_spec("missing").as_required(),
        ])
    }

    fn env() -> TestEnv {
        let env = TestEnv::new();
        env.host.place_active("active/active.php", "1.0");
        env.host.place_active("stale/stale.php", "1.0");
        env.host.place("idle/idle.php", "1.0");
        env.host.place("idle-old/idle-old.php", "1.0");
        env
    }

    #[test]
    fn test_counts_per_filter() {
        let env = env();
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());

        let counts = snapshot.counts;
        assert_eq!(counts.all, 5);
        assert_eq!(counts.featured, 1);
        assert_eq!(counts.required, 2);
        // Active-but-outdated counts under `all` only
        assert_eq!(counts.active, 1);
        assert_eq!(counts.inactive, 2);
        assert_eq!(counts.not_installed, 1);
        assert_eq!(counts.default_filter(), Some(CatalogFilter::All));
        assert_eq!(env.host.mutation_count(), 0);
    }

    #[test]
    fn test_filtered_views_and_actions() {
        let env = env();
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());

        let inactive: Vec<&str> = snapshot
            .filtered(CatalogFilter::Inactive)
            .map(|e| e.spec.slug.as_str())
            .collect();
        assert_eq!(inactive, vec!["idle", "idle-old"]);

        let stale = snapshot.get("stale").unwrap();
        assert_eq!(stale.state, PackageState::ActiveNeedsUpdate);
        assert_eq!(stale.action(), Some("update"));
        assert_eq!(
            stale.version_info().as_deref(),
            Some("Current: 1.0 | Required: 2.0")
        );
        assert_eq!(snapshot.get("missing").unwrap().action(), Some("install"));
        assert_eq!(snapshot.get("active").unwrap().action(), None);

        let outdated: Vec<&str> = snapshot
            .needing_update()
            .map(|e| e.spec.slug.as_str())
            .collect();
        assert_eq!(outdated, vec!["stale", "idle-old"]);
        assert!(!snapshot.all_active());
    }

    #[test]
    fn test_empty_catalog_has_no_default_filter() {
        let env = TestEnv::new();
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&Catalog::new(), &engine.inspector());
        assert_eq!(snapshot.counts.default_filter(), None);
        assert!(snapshot.all_active());
    }

    #[test]
    fn test_snapshot_serializes_flat_entries() {
        let env = env();
        let engine = env.engine();
        let snapshot = CatalogSnapshot::capture(&catalog(), &engine.inspector());

        let json = serde_json::to_value(&snapshot).unwrap();
        let first = &json["entries"][0];
        assert_eq!(first["slug"], "active");
        assert_eq!(first["state"], snapshot.entries[0].state.as_str());
        assert_eq!(first["installed_version"], "1.0");
        assert_eq!(json["counts"]["not-installed"], 1);
    }
}
