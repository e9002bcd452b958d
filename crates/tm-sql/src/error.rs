//! Error types for tm-sql

use thiserror::Error;

/// Rendering and statement validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// Empty statement (S001)
    #[error("[S001] SQL statement is empty")]
    EmptyStatement,

    /// More than one top-level statement in a single statement slot (S002)
    #[error("[S002] Expected exactly one top-level statement, found {count}")]
    MultipleStatements { count: usize },

    /// Dollar-quoted procedural block opened but never closed (S003)
    #[error("[S003] Unterminated procedural block: {message}")]
    UnterminatedBlock { message: String },

    /// Statement is the tail of a block split across statements (S004)
    #[error("[S004] Statement is a fragment of a procedural block split across top-level statements: {fragment}")]
    DanglingBlockFragment { fragment: String },

    /// BEGIN/END mismatch inside a procedural block (S005)
    #[error("[S005] Unbalanced procedural block: {begins} BEGIN vs {ends} END")]
    UnbalancedBlock { begins: usize, ends: usize },

    /// Construct the dialect cannot express (S006)
    #[error("[S006] {construct} is not supported by the {dialect} dialect")]
    UnsupportedConstruct {
        dialect: &'static str,
        construct: String,
    },

    /// Malformed logical operation (S007)
    #[error("[S007] Invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Tokenizer rejected the statement (S008)
    #[error("[S008] SQL tokenize error: {message}")]
    TokenizeError { message: String },
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
