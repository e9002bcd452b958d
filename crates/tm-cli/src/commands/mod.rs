//! CLI command implementations

pub(crate) mod common;
pub(crate) mod migrate;
pub(crate) mod plan;
pub(crate) mod reset;
pub(crate) mod status;
