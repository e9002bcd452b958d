//! SQLite database backend implementation

use crate::error::{DbError, DbResult, ErrorClass};
use crate::traits::Connection;
use crate::value::SqlValue;
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{ffi, params_from_iter, ErrorCode, ToSql};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tm_core::Dialect;

/// Virtual machine instructions between statement deadline checks
const PROGRESS_INTERVAL: i32 = 1_000;

/// SQLite database backend
pub struct SqliteBackend {
    conn: rusqlite::Connection,
    statement_timeout: Option<Duration>,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl SqliteBackend {
    /// Create a new in-memory SQLite connection
    pub fn in_memory() -> DbResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create a new SQLite connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Self::with_connection(conn)
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn with_connection(conn: rusqlite::Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let watched = Arc::clone(&deadline);
        // Returning true from the handler interrupts the running statement.
        conn.progress_handler(
            PROGRESS_INTERVAL,
            Some(move || {
                watched
                    .lock()
                    .ok()
                    .and_then(|guard| *guard)
                    .is_some_and(|deadline| Instant::now() >= deadline)
            }),
        );

        Ok(Self {
            conn,
            statement_timeout: None,
            deadline,
        })
    }

    /// Run `f` with the statement deadline armed
    fn timed<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>) -> DbResult<T> {
        self.set_deadline(self.statement_timeout.map(|t| Instant::now() + t));
        let result = f(&self.conn);
        self.set_deadline(None);
        result.map_err(classify)
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        if let Ok(mut guard) = self.deadline.lock() {
            *guard = deadline;
        }
    }
}

impl Connection for SqliteBackend {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.timed(|conn| conn.execute_batch(sql))
    }

    fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.timed(|conn| conn.execute(sql, params_from_iter(params.iter())))
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        self.timed(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let width = stmt.column_count();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_value_ref(row.get_ref(i)?));
                }
                out.push(values);
            }
            Ok(out)
        })
    }

    fn set_timeouts(&mut self, statement: Option<Duration>, lock: Duration) -> DbResult<()> {
        self.statement_timeout = statement;
        self.conn.busy_timeout(lock).map_err(classify)
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn acquire_migration_lock(&mut self, key: &str) -> DbResult<()> {
        // Writers are already serialised by the database file lock, bounded
        // by busy_timeout.
        log::debug!("SQLite relies on the file lock for migration lock {}", key);
        Ok(())
    }

    fn release_migration_lock(&mut self, _key: &str) -> DbResult<()> {
        Ok(())
    }

    fn relation_exists(&mut self, name: &str) -> DbResult<bool> {
        let count: i64 = self.timed(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [name],
                |row| row.get(0),
            )
        })?;
        Ok(count > 0)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.to_rfc3339_opts(SecondsFormat::Micros, true)))
            }
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Classify a rusqlite error.
///
/// SQLite reports "already exists" and "duplicate column" conditions with
/// the generic SQLITE_ERROR code, so those two are recognised by message.
/// Prepare-time failures arrive as `SqlInputError` and carry the same code.
fn classify(err: rusqlite::Error) -> DbError {
    let class = match &err {
        rusqlite::Error::SqliteFailure(code, message) => {
            classify_code(code, message.as_deref().unwrap_or_default())
        }
        rusqlite::Error::SqlInputError { error, msg, .. } => classify_code(error, msg),
        _ => ErrorClass::Other,
    };
    DbError::execution(class, err.to_string())
}

fn classify_code(code: &ffi::Error, message: &str) -> ErrorClass {
    match code.code {
        ErrorCode::OperationInterrupted => ErrorClass::Timeout,
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => ErrorClass::LockUnavailable,
        ErrorCode::CannotOpen => ErrorClass::Connection,
        ErrorCode::ConstraintViolation
            if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            ErrorClass::UniqueViolation
        }
        _ => classify_message(message),
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if lower.contains("duplicate column name") {
        ErrorClass::DuplicateColumn
    } else if lower.contains("already exists") {
        if lower.starts_with("index") || lower.starts_with("trigger") {
            ErrorClass::DuplicateObject
        } else {
            ErrorClass::DuplicateRelation
        }
    } else {
        ErrorClass::Other
    }
}

#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;
