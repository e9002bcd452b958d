//! tm-core - Core library for tidemark
//!
//! This crate provides the types shared by every tidemark component: the
//! target SQL dialect, migration version numbers, `tidemark.yml`
//! configuration, checksums and identifier quoting.

pub mod checksum;
pub mod config;
pub mod dialect;
pub mod error;
pub(crate) mod serde_helpers;
pub mod sql_utils;
pub mod version;

pub use checksum::compute_checksum;
pub use config::{Config, DatabaseConfig, TargetConfig};
pub use dialect::Dialect;
pub use error::{CoreError, CoreResult};
pub use version::Version;
