//! Common test utilities for tether-packages
//!
//! - Recording host registry mock with failure injection
//! - Package spec and zip archive builders
//! - A temporary environment wiring engine, stores and clock together

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
