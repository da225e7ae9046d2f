//! Package lifecycle reconciliation for Tether
//!
//! This crate handles:
//! - Lifecycle state inspection against the host package registry
//! - Desired-state catalog construction with late-bound providers
//! - Multi-strategy zip extraction and package location
//! - Install/activate/update convergence, single and bulk
//! - Time-boxed notice suppression and convergence guards
//! - The operation surface consumed by the CLI

pub mod archive;
pub mod catalog;
pub mod clock;
pub mod fs_host;
pub mod guard;
pub mod header;
pub mod host;
pub mod inspector;
pub mod locator;
pub mod notices;
pub mod reconcile;
pub mod remote;
pub mod service;
pub mod store;

pub use archive::{ArchiveExtractor, ExtractStrategy};
pub use catalog::{
    Catalog, CatalogBuilder, CatalogCounts, CatalogFilter, CatalogProvider, CatalogSnapshot,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fs_host::FsHost;
pub use guard::TransientGuard;
pub use host::{HostRegistry, RemoteMetadata};
pub use inspector::StateInspector;
pub use locator::PackageLocator;
pub use notices::{NoticeStore, PendingNotice};
pub use reconcile::{
    Outcome, PackageOutcome, PackageResult, ReconciliationEngine, ReconciliationResult,
};
pub use remote::RegistryClient;
pub use service::{Capability, Caller, Envelope, PackageService};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, Scope};
