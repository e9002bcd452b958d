//! Connection trait definition

use std::time::Duration;

use tm_core::sql_utils::quote_ident;
use tm_core::Dialect;

use crate::error::DbResult;
use crate::value::SqlValue;

/// Blocking database connection driven by the migration runner.
///
/// One connection is used for a whole run; implementations hold no state
/// that outlives it. Statements passed to [`Connection::execute`] are
/// single, already validated top-level statements.
pub trait Connection: Send {
    /// Backend identifier for logging
    fn backend(&self) -> &'static str;

    /// SQL dialect spoken by this connection
    fn dialect(&self) -> Dialect;

    /// Execute one statement without parameters
    fn execute(&mut self, sql: &str) -> DbResult<()>;

    /// Execute one statement with positional parameters, returns affected rows
    fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// Run a query and return every row
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>>;

    /// Bound statement execution (`None` = unbounded) and lock waits
    fn set_timeouts(&mut self, statement: Option<Duration>, lock: Duration) -> DbResult<()>;

    /// Whether DDL can be rolled back as part of a transaction
    fn supports_transactional_ddl(&self) -> bool;

    /// Start a transaction
    fn begin(&mut self) -> DbResult<()> {
        self.execute("BEGIN")
    }

    /// Commit the current transaction
    fn commit(&mut self) -> DbResult<()> {
        self.execute("COMMIT")
    }

    /// Roll back the current transaction
    fn rollback(&mut self) -> DbResult<()> {
        self.execute("ROLLBACK")
    }

    fn savepoint(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("SAVEPOINT {}", quote_ident(name)))
    }

    fn rollback_to(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", quote_ident(name)))
    }

    fn release(&mut self, name: &str) -> DbResult<()> {
        self.execute(&format!("RELEASE SAVEPOINT {}", quote_ident(name)))
    }

    /// Take the exclusive migration lock identified by `key`, waiting at
    /// most the configured lock timeout
    fn acquire_migration_lock(&mut self, key: &str) -> DbResult<()>;

    /// Release the migration lock
    fn release_migration_lock(&mut self, key: &str) -> DbResult<()>;

    /// Check if a table or view exists
    fn relation_exists(&mut self, name: &str) -> DbResult<bool>;
}
