//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;
use tm_core::{CoreError, Dialect, Version};
use tm_db::DbError;
use tm_sql::SqlError;

use crate::unit::IdempotencyMode;

/// Malformed or conflicting migration definitions.
///
/// Always raised before any statement runs.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Two units for the active dialect share a version (L001).
    #[error("[L001] Duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        version: Version,
        first: String,
        second: String,
    },

    /// A portable unit and a dialect-bound unit share a version (L002).
    #[error("[L002] Migration {version} has both a portable and a {dialect}-only definition")]
    ConflictingVariants { version: Version, dialect: Dialect },

    /// Unit has no statements (L003).
    #[error("[L003] Migration {version} ('{name}') has no statements")]
    EmptyUnit { version: Version, name: String },

    /// Migration file could not be read (L004).
    #[error("[L004] Failed to read migration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Migration file is not valid YAML for a unit (L005).
    #[error("[L005] Failed to parse migration file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Version neither declared in the file nor encoded in its name (L006).
    #[error("[L006] Cannot determine version of migration file '{}': {source}", path.display())]
    MissingVersion { path: PathBuf, source: CoreError },
}

/// Migration run errors.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Repository could not be loaded (M001).
    #[error("[M001] {0}")]
    Load(#[from] LoadError),

    /// A statement cannot be expressed for the active dialect (M002).
    #[error("[M002] Migration {version} operation {statement_index} cannot be rendered for {dialect}: {source}")]
    Render {
        version: Version,
        statement_index: usize,
        dialect: Dialect,
        source: SqlError,
    },

    /// Object already exists and the unit does not tolerate it (M003).
    #[error("[M003] Migration {version} statement {statement_index}: object already exists and the unit is {mode}: {source}")]
    AlreadyExists {
        version: Version,
        statement_index: usize,
        mode: IdempotencyMode,
        source: DbError,
    },

    /// Statement failed (M004).
    #[error("[M004] Migration {version} statement {statement_index} failed: {source}")]
    StatementFailed {
        version: Version,
        statement_index: usize,
        source: DbError,
    },

    /// Statement exceeded its timeout (M005).
    #[error("[M005] Migration {version} statement {statement_index} timed out: {source}")]
    Timeout {
        version: Version,
        statement_index: usize,
        source: DbError,
    },

    /// Non-atomic unit failed after some statements succeeded (M006).
    #[error("[M006] Migration {version} is partially applied: statement {statement_index} failed after {applied_statements} statement(s) succeeded; repair the schema manually before re-running: {source}")]
    PartialApplication {
        version: Version,
        statement_index: usize,
        applied_statements: usize,
        source: DbError,
    },

    /// Schema changed but the ledger row could not be written (M007).
    #[error("[M007] Migration {version} changed the schema but could not be recorded in the ledger; record it manually before re-running: {source}")]
    LedgerWrite { version: Version, source: DbError },

    /// Ledger could not be created or read (M008).
    #[error("[M008] Ledger access failed: {0}")]
    Ledger(#[source] DbError),

    /// Migration lock not acquired (M009).
    #[error("[M009] Could not acquire the migration lock: {0}")]
    Lock(#[source] DbError),

    /// Connection setup (timeouts, transactions) failed (M010).
    #[error("[M010] Connection setup failed: {0}")]
    Connection(#[source] DbError),

    /// Repository and connection target different dialects (M011).
    #[error("[M011] Migrations were loaded for {repository} but the connection speaks {connection}")]
    DialectMismatch {
        repository: Dialect,
        connection: Dialect,
    },
}

impl MigrateError {
    /// Version the error is attributed to, when there is one
    pub fn version(&self) -> Option<Version> {
        match self {
            MigrateError::Render { version, .. }
            | MigrateError::AlreadyExists { version, .. }
            | MigrateError::StatementFailed { version, .. }
            | MigrateError::Timeout { version, .. }
            | MigrateError::PartialApplication { version, .. }
            | MigrateError::LedgerWrite { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// 1-based statement index the error is attributed to, when there is one
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            MigrateError::Render {
                statement_index, ..
            }
            | MigrateError::AlreadyExists {
                statement_index, ..
            }
            | MigrateError::StatementFailed {
                statement_index, ..
            }
            | MigrateError::Timeout {
                statement_index, ..
            }
            | MigrateError::PartialApplication {
                statement_index, ..
            } => Some(*statement_index),
            _ => None,
        }
    }
}

/// Result type alias for [`MigrateError`].
pub type MigrateResult<T> = Result<T, MigrateError>;
