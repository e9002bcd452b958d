//! Error types for tm-core

use thiserror::Error;

/// Core error type for tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Invalid configuration value
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Unknown target requested
    #[error("[C003] Unknown target '{name}'. Available targets: {available}")]
    UnknownTarget { name: String, available: String },

    /// C004: Unparseable migration version
    #[error("[C004] Invalid migration version '{input}': expected a non-negative integer, optionally zero-padded or prefixed with 'v'")]
    InvalidVersion { input: String },

    /// C005: Unknown dialect name
    #[error("[C005] Unknown dialect '{name}': expected one of sqlite, postgres")]
    UnknownDialect { name: String },

    /// C006: IO error with file path context
    #[error("[C006] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C007: YAML parse error
    #[error("[C007] Failed to parse config: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
