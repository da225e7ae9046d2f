//! Configuration loading for Tether

mod hierarchical_loader;

pub use hierarchical_loader::HierarchicalConfigLoader;
