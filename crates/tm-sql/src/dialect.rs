//! SQL dialect abstraction

use sqlparser::dialect::{
    Dialect, PostgreSqlDialect as SqlParserPostgres, SQLiteDialect as SqlParserSqlite,
};
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError};
use tm_core::sql_utils::{quote_ident, quote_literal};
use tm_core::Dialect as DialectKind;

use crate::error::{SqlError, SqlResult};
use crate::operation::{ColumnDescriptor, ColumnType, InsertRows, Literal, SqlExpr};
use crate::render::{column_clause, insert_prefix, Guard, RenderedStatement};

/// Trait for SQL dialect implementations
///
/// A dialect owns every decision that differs between engines: type names,
/// literal syntax, placeholder syntax and how the conditional operations
/// (`add column if absent`, `insert ignoring conflicts`) are expressed.
pub trait SqlDialect: Send + Sync {
    /// Get the underlying sqlparser dialect
    fn parser_dialect(&self) -> &dyn Dialect;

    /// Which engine this dialect targets
    fn kind(&self) -> DialectKind;

    /// Get the dialect name
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Quote an identifier for this dialect
    fn quote_ident(&self, ident: &str) -> String {
        quote_ident(ident)
    }

    /// Positional bind parameter `n` (1-based)
    fn placeholder(&self, n: usize) -> String;

    /// Concrete type name for a logical column type
    fn type_name(&self, column_type: &ColumnType) -> String;

    /// Boolean literal
    fn bool_literal(&self, value: bool) -> &'static str;

    /// Render a literal value as SQL text
    fn literal(&self, value: &Literal) -> SqlResult<String> {
        match value {
            Literal::Null => Ok("NULL".to_string()),
            Literal::Bool(b) => Ok(self.bool_literal(*b).to_string()),
            Literal::Int(i) => Ok(i.to_string()),
            Literal::Float(f) if f.is_finite() => Ok(f.to_string()),
            Literal::Float(f) => Err(SqlError::InvalidOperation {
                message: format!("non-finite float literal {f}"),
            }),
            Literal::Expr(SqlExpr::CurrentTimestamp) => Ok("CURRENT_TIMESTAMP".to_string()),
            Literal::Text(s) => Ok(quote_literal(s)),
        }
    }

    /// Whether `DO` blocks may appear in rendered or raw statements
    fn supports_procedural_blocks(&self) -> bool;

    /// Whether a rename-as-add drops the legacy column
    fn drops_legacy_columns(&self) -> bool;

    /// Render "add this column unless it already exists"
    fn add_column_if_absent(&self, column: &ColumnDescriptor) -> SqlResult<RenderedStatement>;

    /// Render "insert these rows, skipping rows that violate a unique guard"
    fn insert_ignoring_conflict(&self, insert: &InsertRows) -> SqlResult<RenderedStatement>;

    /// Tokenize SQL with this dialect's rules
    fn tokenize(&self, sql: &str) -> Result<Vec<Token>, TokenizerError> {
        Tokenizer::new(self.parser_dialect(), sql).tokenize()
    }
}

/// Build the dialect adapter for a target engine
pub fn dialect_for(kind: DialectKind) -> Box<dyn SqlDialect> {
    match kind {
        DialectKind::Sqlite => Box::new(SqliteDialect::new()),
        DialectKind::Postgres => Box::new(PostgresDialect::new()),
    }
}

/// SQLite (embedded, file-backed) dialect
///
/// `ALTER TABLE ... ADD COLUMN` has no `IF NOT EXISTS` form, so the
/// statement is emitted plain and marked for reconciliation: a
/// "duplicate column" failure means the column is already there.
pub struct SqliteDialect {
    dialect: SqlParserSqlite,
}

impl SqliteDialect {
    /// Create a new SQLite dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserSqlite {},
        }
    }

    fn unsupported(&self, construct: String) -> SqlError {
        SqlError::UnsupportedConstruct {
            dialect: "sqlite",
            construct,
        }
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlDialect for SqliteDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn placeholder(&self, n: usize) -> String {
        format!("?{n}")
    }

    fn type_name(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::AutoId => "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            ColumnType::Integer | ColumnType::BigInt => "INTEGER".to_string(),
            ColumnType::Real => "REAL".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({n})"),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TEXT".to_string(),
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn supports_procedural_blocks(&self) -> bool {
        false
    }

    fn drops_legacy_columns(&self) -> bool {
        false
    }

    fn add_column_if_absent(&self, column: &ColumnDescriptor) -> SqlResult<RenderedStatement> {
        let target = format!("{}.{}", column.table, column.column);
        if column.unique {
            return Err(self.unsupported(format!(
                "adding UNIQUE column {target} (create a unique index instead)"
            )));
        }
        if !column.nullable && column.default.is_none() {
            return Err(self.unsupported(format!(
                "adding NOT NULL column {target} without a default"
            )));
        }
        if matches!(&column.default, Some(d) if !d.is_constant()) {
            return Err(self.unsupported(format!(
                "adding column {target} with a non-constant default"
            )));
        }

        Ok(RenderedStatement {
            sql: format!(
                "ALTER TABLE {} ADD COLUMN {}",
                self.quote_ident(&column.table),
                column_clause(self, column)?
            ),
            guard: Guard::Reconcile,
        })
    }

    fn insert_ignoring_conflict(&self, insert: &InsertRows) -> SqlResult<RenderedStatement> {
        let (columns, values) = insert_prefix(self, insert)?;
        Ok(RenderedStatement {
            sql: format!(
                "INSERT OR IGNORE INTO {} ({}) VALUES {}",
                self.quote_ident(&insert.table),
                columns,
                values
            ),
            guard: Guard::Native,
        })
    }
}

/// PostgreSQL (server) dialect
pub struct PostgresDialect {
    dialect: SqlParserPostgres,
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect
    pub fn new() -> Self {
        Self {
            dialect: SqlParserPostgres {},
        }
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

/// Dollar-quote tag for generated procedural blocks
const BLOCK_TAG: &str = "$tm$";

impl SqlDialect for PostgresDialect {
    fn parser_dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }

    fn type_name(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::AutoId => "SERIAL PRIMARY KEY".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Real => "DOUBLE PRECISION".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({n})"),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::TimestampTz => "TIMESTAMPTZ".to_string(),
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    fn supports_procedural_blocks(&self) -> bool {
        true
    }

    fn drops_legacy_columns(&self) -> bool {
        true
    }

    fn add_column_if_absent(&self, column: &ColumnDescriptor) -> SqlResult<RenderedStatement> {
        // The existence probe and the ALTER live in one DO block so the
        // whole check-then-add is a single top-level statement.
        let sql = format!(
            "DO {tag} BEGIN \
             IF NOT EXISTS (SELECT 1 FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = {table} AND column_name = {column}) \
             THEN ALTER TABLE {ident} ADD COLUMN {clause}; \
             END IF; \
             END {tag}",
            tag = BLOCK_TAG,
            table = quote_literal(&column.table),
            column = quote_literal(&column.column),
            ident = self.quote_ident(&column.table),
            clause = column_clause(self, column)?,
        );
        Ok(RenderedStatement {
            sql,
            guard: Guard::Native,
        })
    }

    fn insert_ignoring_conflict(&self, insert: &InsertRows) -> SqlResult<RenderedStatement> {
        let (columns, values) = insert_prefix(self, insert)?;
        let conflict = if insert.conflict_columns.is_empty() {
            String::new()
        } else {
            format!(
                " ({})",
                insert
                    .conflict_columns
                    .iter()
                    .map(|c| self.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        Ok(RenderedStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {} ON CONFLICT{} DO NOTHING",
                self.quote_ident(&insert.table),
                columns,
                values,
                conflict
            ),
            guard: Guard::Native,
        })
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;
