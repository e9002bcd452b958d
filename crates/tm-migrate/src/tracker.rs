//! Ledger of applied migration versions.
//!
//! The ledger is an ordinary table in the target database, created with the
//! same dialect adapter as every other table. A version is present iff its
//! unit completed; rows are never updated in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tm_core::sql_utils::quote_ident;
use tm_core::{Dialect, Version};
use tm_db::{Connection, DbError, DbResult, ErrorClass, SqlValue};
use tm_sql::{dialect_for, render, ColumnDef, ColumnType, LogicalOperation, SqlDialect, TableDef};

/// One ledger row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaStateRecord {
    pub version: Version,
    pub name: String,
    /// Checksum of the rendered statements; absent for rows written by
    /// tools that predate checksums
    pub checksum: Option<String>,
    pub applied_at: DateTime<Utc>,
    /// Whether at least one statement was reconciled instead of executed
    pub reconciled: bool,
}

/// Reads and writes the ledger table
pub struct SchemaTracker {
    table: String,
    dialect: Box<dyn SqlDialect>,
}

impl std::fmt::Debug for SchemaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaTracker")
            .field("table", &self.table)
            .field("dialect", &self.dialect.kind())
            .finish()
    }
}

impl SchemaTracker {
    pub fn new(table: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            table: table.into(),
            dialect: dialect_for(dialect),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ledger table as a logical operation
    pub fn ledger_definition(&self) -> LogicalOperation {
        LogicalOperation::CreateTableIfAbsent(
            TableDef::new(&self.table)
                .column(
                    ColumnDef::new("version", ColumnType::BigInt)
                        .primary_key()
                        .not_null(),
                )
                .column(ColumnDef::new("name", ColumnType::Text).not_null())
                .column(ColumnDef::new("checksum", ColumnType::Varchar(64)))
                .column(ColumnDef::new("applied_at", ColumnType::TimestampTz).not_null())
                .column(
                    ColumnDef::new("reconciled", ColumnType::Boolean)
                        .not_null()
                        .default(false),
                ),
        )
    }

    /// Create the ledger table if it does not exist yet
    pub fn ensure_ledger(&self, conn: &mut dyn Connection) -> DbResult<()> {
        let statements = render(&self.ledger_definition(), self.dialect.as_ref())
            .map_err(|e| DbError::execution(ErrorClass::Other, e.to_string()))?;
        for statement in statements {
            conn.execute(&statement.sql)?;
        }
        log::debug!("Ledger table {} is present", self.table);
        Ok(())
    }

    pub fn ledger_exists(&self, conn: &mut dyn Connection) -> DbResult<bool> {
        conn.relation_exists(&self.table)
    }

    /// Every ledger row, ordered by version
    pub fn applied_records(&self, conn: &mut dyn Connection) -> DbResult<Vec<SchemaStateRecord>> {
        let sql = format!(
            "SELECT version, name, checksum, applied_at, reconciled FROM {} ORDER BY version",
            quote_ident(&self.table)
        );
        conn.query(&sql, &[])?
            .into_iter()
            .map(|row| record_from_row(&row))
            .collect()
    }

    pub fn applied_versions(&self, conn: &mut dyn Connection) -> DbResult<BTreeSet<Version>> {
        Ok(self
            .applied_records(conn)?
            .into_iter()
            .map(|r| r.version)
            .collect())
    }

    /// Append a ledger row
    pub fn record_applied(
        &self,
        conn: &mut dyn Connection,
        record: &SchemaStateRecord,
    ) -> DbResult<()> {
        let placeholders = (1..=5)
            .map(|n| self.dialect.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} (version, name, checksum, applied_at, reconciled) VALUES ({})",
            quote_ident(&self.table),
            placeholders
        );
        let checksum = match &record.checksum {
            Some(c) => SqlValue::Text(c.clone()),
            None => SqlValue::Null,
        };
        conn.execute_with(
            &sql,
            &[
                SqlValue::Integer(record.version.as_i64()),
                SqlValue::Text(record.name.clone()),
                checksum,
                SqlValue::Timestamp(record.applied_at),
                SqlValue::Bool(record.reconciled),
            ],
        )?;
        Ok(())
    }

    /// Forget ledger rows so their units run again.
    ///
    /// `None` clears the whole ledger, `Some(v)` removes `v` and every later
    /// version. The schema itself is left untouched. Returns the number of
    /// removed rows; a missing ledger removes nothing.
    pub fn reset(&self, conn: &mut dyn Connection, from: Option<Version>) -> DbResult<usize> {
        if !self.ledger_exists(conn)? {
            return Ok(0);
        }
        let table = quote_ident(&self.table);
        match from {
            None => conn.execute_with(&format!("DELETE FROM {table}"), &[]),
            Some(version) => conn.execute_with(
                &format!(
                    "DELETE FROM {table} WHERE version >= {}",
                    self.dialect.placeholder(1)
                ),
                &[SqlValue::Integer(version.as_i64())],
            ),
        }
    }
}

fn conversion(column: usize, message: impl Into<String>) -> DbError {
    DbError::Conversion {
        column,
        message: message.into(),
    }
}

fn record_from_row(row: &[SqlValue]) -> DbResult<SchemaStateRecord> {
    let cell = |idx: usize| {
        row.get(idx)
            .ok_or_else(|| conversion(idx, "missing ledger column"))
    };

    let raw_version = cell(0)?
        .as_i64()
        .ok_or_else(|| conversion(0, "version is not an integer"))?;
    let version = Version::try_from(raw_version).map_err(|e| conversion(0, e.to_string()))?;
    let name = cell(1)?
        .as_str()
        .ok_or_else(|| conversion(1, "name is not text"))?
        .to_string();
    let checksum = match cell(2)? {
        SqlValue::Null => None,
        value => Some(
            value
                .as_str()
                .ok_or_else(|| conversion(2, "checksum is not text"))?
                .to_string(),
        ),
    };
    let applied_at = cell(3)?
        .as_timestamp()
        .ok_or_else(|| conversion(3, "applied_at is not a timestamp"))?;
    let reconciled = cell(4)?.as_bool().unwrap_or(false);

    Ok(SchemaStateRecord {
        version,
        name,
        checksum,
        applied_at,
        reconciled,
    })
}

#[cfg(test)]
#[path = "tracker_test.rs"]
mod tests;
