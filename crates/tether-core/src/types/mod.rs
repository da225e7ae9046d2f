//! Type definitions for Tether packages, catalogs and configuration

mod catalog_types;
mod package_types;
mod runtime_config;

pub use catalog_types::*;
pub use package_types::*;
pub use runtime_config::*;
