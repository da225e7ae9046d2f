//! Temporary environment wiring a mock host to the real engine

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tether_core::types::{ConvergenceConfig, PackageSpec};
use tether_packages::archive::BuiltinZipStrategy;
use tether_packages::{
    ArchiveExtractor, CatalogBuilder, ManualClock, MemoryStore, NoticeStore, PackageService,
    ReconciliationEngine, TransientGuard,
};

use super::mocks::MockHost;

pub struct TestEnv {
    pub temp: TempDir,
    pub host: Arc<MockHost>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let host = Arc::new(MockHost::new(temp.path().join("packages")));
        std::fs::create_dir_all(temp.path().join("archives")).unwrap();
        Self {
            temp,
            host,
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::default()),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().join("packages")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.temp.path().join("archives")
    }

    /// Engine with the builtin reader only, so results do not depend on host tools
    pub fn engine(&self) -> ReconciliationEngine {
        self.engine_with(ArchiveExtractor::new(vec![Box::new(BuiltinZipStrategy)]))
    }

    pub fn engine_with(&self, extractor: ArchiveExtractor) -> ReconciliationEngine {
        ReconciliationEngine::new(self.host.clone(), Arc::new(extractor), self.archive_dir())
    }

    pub fn guard(&self) -> TransientGuard {
        TransientGuard::new(self.store.clone(), self.clock.clone())
    }

    pub fn notices(&self) -> NoticeStore {
        NoticeStore::new(self.store.clone(), self.clock.clone())
    }

    pub fn service(&self, catalog: Vec<PackageSpec>) -> PackageService {
        PackageService::new(
            self.engine(),
            CatalogBuilder::new(catalog),
            self.notices(),
            self.guard(),
            ConvergenceConfig::default(),
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
