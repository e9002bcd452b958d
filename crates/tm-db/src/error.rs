//! Error types for tm-db

use thiserror::Error;

/// Coarse classification of a backend failure.
///
/// The migration reconciler only looks at the class, never at driver
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Column already exists on the table
    DuplicateColumn,
    /// Table or view already exists
    DuplicateRelation,
    /// Index, constraint or other named object already exists
    DuplicateObject,
    /// Row violates a unique or primary key constraint
    UniqueViolation,
    /// Statement exceeded its time bound
    Timeout,
    /// Lock could not be acquired within its time bound
    LockUnavailable,
    /// Connection lost or could not be established
    Connection,
    Other,
}

impl ErrorClass {
    /// Whether the failure means "the object or row is already there"
    pub fn is_duplicate(self) -> bool {
        matches!(
            self,
            ErrorClass::DuplicateColumn
                | ErrorClass::DuplicateRelation
                | ErrorClass::DuplicateObject
                | ErrorClass::UniqueViolation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::DuplicateColumn => "duplicate_column",
            ErrorClass::DuplicateRelation => "duplicate_relation",
            ErrorClass::DuplicateObject => "duplicate_object",
            ErrorClass::UniqueViolation => "unique_violation",
            ErrorClass::Timeout => "timeout",
            ErrorClass::LockUnavailable => "lock_unavailable",
            ErrorClass::Connection => "connection",
            ErrorClass::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed ({class}): {message}")]
    ExecutionError { class: ErrorClass, message: String },

    /// Statement timeout (D003)
    #[error("[D003] Statement exceeded its timeout: {0}")]
    Timeout(String),

    /// Lock wait timeout (D004)
    #[error("[D004] Lock not available: {0}")]
    LockUnavailable(String),

    /// Unexpected column value (D005)
    #[error("[D005] Cannot read column {column}: {message}")]
    Conversion { column: usize, message: String },
}

impl DbError {
    /// Build an execution error of a given class
    pub fn execution(class: ErrorClass, message: impl Into<String>) -> Self {
        match class {
            ErrorClass::Timeout => DbError::Timeout(message.into()),
            ErrorClass::LockUnavailable => DbError::LockUnavailable(message.into()),
            ErrorClass::Connection => DbError::ConnectionError(message.into()),
            _ => DbError::ExecutionError {
                class,
                message: message.into(),
            },
        }
    }

    /// Classification of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            DbError::ConnectionError(_) => ErrorClass::Connection,
            DbError::ExecutionError { class, .. } => *class,
            DbError::Timeout(_) => ErrorClass::Timeout,
            DbError::LockUnavailable(_) => ErrorClass::LockUnavailable,
            DbError::Conversion { .. } => ErrorClass::Other,
        }
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_routes_by_class() {
        assert!(matches!(
            DbError::execution(ErrorClass::Timeout, "slow"),
            DbError::Timeout(_)
        ));
        assert!(matches!(
            DbError::execution(ErrorClass::LockUnavailable, "busy"),
            DbError::LockUnavailable(_)
        ));
        let err = DbError::execution(ErrorClass::DuplicateColumn, "duplicate column name: x");
        assert_eq!(err.class(), ErrorClass::DuplicateColumn);
        assert!(err.to_string().starts_with("[D002]"));
    }

    #[test]
    fn test_duplicate_classes() {
        assert!(ErrorClass::DuplicateColumn.is_duplicate());
        assert!(ErrorClass::UniqueViolation.is_duplicate());
        assert!(!ErrorClass::Timeout.is_duplicate());
        assert!(!ErrorClass::Other.is_duplicate());
    }
}
