//! # tether-core
//!
//! Core library for Tether providing:
//! - Package declarations and lifecycle state types
//! - The error taxonomy shared by every crate
//! - Runtime configuration loading (embedded defaults, files, environment)
//! - Lenient dotted-version comparison

pub mod config;
pub mod error;
pub mod types;
pub mod utils;
pub mod version;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use utils::get_home_dir;
