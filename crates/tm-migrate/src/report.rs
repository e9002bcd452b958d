//! Run summary.

use serde::Serialize;
use std::collections::BTreeSet;
use tm_core::Version;

/// A statement whose duplicate-object failure was treated as success
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledStatement {
    pub version: Version,
    /// 1-based position of the source operation in the unit
    pub statement_index: usize,
    /// Error class reported by the backend
    pub class: String,
}

/// What a run did, also returned (partially filled) with a failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Versions applied by this run, in order
    pub applied_versions: Vec<Version>,
    /// Versions already in the ledger
    pub skipped_versions: BTreeSet<Version>,
    pub reconciled: Vec<ReconciledStatement>,
    /// Applied versions whose current rendering no longer matches the
    /// recorded checksum
    pub checksum_drift: Vec<Version>,
    pub duration_ms: u64,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied_versions.is_empty()
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} applied, {} already applied",
            self.applied_versions.len(),
            self.skipped_versions.len()
        );
        if !self.reconciled.is_empty() {
            line.push_str(&format!(", {} statement(s) reconciled", self.reconciled.len()));
        }
        if !self.checksum_drift.is_empty() {
            line.push_str(&format!(", {} with checksum drift", self.checksum_drift.len()));
        }
        line.push_str(&format!(" in {}ms", self.duration_ms));
        line
    }
}
