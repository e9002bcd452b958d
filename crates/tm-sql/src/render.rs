//! Rendering of logical operations into dialect SQL
//!
//! Every statement produced here passes [`validate_statement`] before it is
//! returned, so a rendered list is always a sequence of complete top-level
//! statements.

use serde::Serialize;

use crate::dialect::SqlDialect;
use crate::error::{SqlError, SqlResult};
use crate::operation::{
    ColumnDef, ColumnDescriptor, ColumnType, IndexDef, InsertRows, LogicalOperation, RenameAsAdd,
    TableConstraint, TableDef,
};
use crate::validator::validate_statement;

/// How a rendered statement behaves when its effect is already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// The engine skips the change itself (`IF NOT EXISTS`, `ON CONFLICT`, ...)
    Native,
    /// The statement fails with a duplicate-object error when the change is
    /// already present; that failure may be reconciled as success
    Reconcile,
    /// No idempotency guarantee
    None,
}

/// One executable top-level statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedStatement {
    pub sql: String,
    pub guard: Guard,
}

impl RenderedStatement {
    fn native(sql: String) -> Self {
        Self {
            sql,
            guard: Guard::Native,
        }
    }
}

/// Render one logical operation for `dialect`.
///
/// Returns zero statements for raw SQL bound to another dialect, and two for
/// a rename on dialects that drop the legacy column.
pub fn render(op: &LogicalOperation, dialect: &dyn SqlDialect) -> SqlResult<Vec<RenderedStatement>> {
    let statements = match op {
        LogicalOperation::CreateTableIfAbsent(table) => vec![create_table(table, dialect)?],
        LogicalOperation::AddColumnIfAbsent(column) => {
            check_descriptor(column)?;
            vec![dialect.add_column_if_absent(column)?]
        }
        LogicalOperation::InsertIgnoringConflict(insert) => {
            vec![dialect.insert_ignoring_conflict(insert)?]
        }
        LogicalOperation::CreateIndexIfAbsent(index) => vec![create_index(index, dialect)?],
        LogicalOperation::RenameAsAdd(rename) => rename_as_add(rename, dialect)?,
        LogicalOperation::Raw(raw) => match raw.dialect {
            Some(bound) if bound != dialect.kind() => Vec::new(),
            _ => vec![RenderedStatement {
                sql: raw.sql.trim().trim_end_matches(';').trim_end().to_string(),
                guard: Guard::None,
            }],
        },
    };

    for statement in &statements {
        validate_statement(&statement.sql, dialect)?;
    }
    Ok(statements)
}

/// Render a sequence of operations, flattening the statements in order
pub fn render_all(
    ops: &[LogicalOperation],
    dialect: &dyn SqlDialect,
) -> SqlResult<Vec<RenderedStatement>> {
    let mut out = Vec::new();
    for op in ops {
        out.extend(render(op, dialect)?);
    }
    Ok(out)
}

fn invalid(message: impl Into<String>) -> SqlError {
    SqlError::InvalidOperation {
        message: message.into(),
    }
}

fn ident_list(dialect: &dyn SqlDialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| dialect.quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_table(table: &TableDef, dialect: &dyn SqlDialect) -> SqlResult<RenderedStatement> {
    if table.columns.is_empty() {
        return Err(invalid(format!("table {} has no columns", table.table)));
    }

    let mut parts = Vec::with_capacity(table.columns.len() + table.constraints.len());
    for column in &table.columns {
        parts.push(column_definition(column, dialect)?);
    }
    for constraint in &table.constraints {
        parts.push(table_constraint(constraint, dialect)?);
    }

    Ok(RenderedStatement::native(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        dialect.quote_ident(&table.table),
        parts.join(",\n    ")
    )))
}

fn column_definition(column: &ColumnDef, dialect: &dyn SqlDialect) -> SqlResult<String> {
    let mut sql = format!(
        "{} {}",
        dialect.quote_ident(&column.name),
        dialect.type_name(&column.column_type)
    );
    // AutoId already carries its key clause.
    if column.column_type != ColumnType::AutoId {
        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&dialect.literal(default)?);
    }
    if let Some(fk) = &column.references {
        sql.push_str(&format!(
            " REFERENCES {}({})",
            dialect.quote_ident(&fk.table),
            dialect.quote_ident(&fk.column)
        ));
        if let Some(action) = fk.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
    }
    Ok(sql)
}

fn table_constraint(constraint: &TableConstraint, dialect: &dyn SqlDialect) -> SqlResult<String> {
    match constraint {
        TableConstraint::PrimaryKey { columns } | TableConstraint::Unique { columns }
            if columns.is_empty() =>
        {
            Err(invalid("table constraint lists no columns"))
        }
        TableConstraint::PrimaryKey { columns } => {
            Ok(format!("PRIMARY KEY ({})", ident_list(dialect, columns)))
        }
        TableConstraint::Unique { columns } => {
            Ok(format!("UNIQUE ({})", ident_list(dialect, columns)))
        }
        TableConstraint::ForeignKey {
            columns,
            references_table,
            references_columns,
            on_delete,
        } => {
            if columns.is_empty() || columns.len() != references_columns.len() {
                return Err(invalid(format!(
                    "foreign key to {references_table} must pair each column with a referenced column"
                )));
            }
            let mut sql = format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                ident_list(dialect, columns),
                dialect.quote_ident(references_table),
                ident_list(dialect, references_columns)
            );
            if let Some(action) = on_delete {
                sql.push_str(" ON DELETE ");
                sql.push_str(action.as_sql());
            }
            Ok(sql)
        }
    }
}

fn check_descriptor(column: &ColumnDescriptor) -> SqlResult<()> {
    if column.column_type == ColumnType::AutoId {
        return Err(invalid(format!(
            "{}.{}: auto id columns can only be declared in create table",
            column.table, column.column
        )));
    }
    Ok(())
}

/// Column clause for `ALTER TABLE ... ADD COLUMN`
pub(crate) fn column_clause(
    dialect: &dyn SqlDialect,
    column: &ColumnDescriptor,
) -> SqlResult<String> {
    let mut sql = format!(
        "{} {}",
        dialect.quote_ident(&column.column),
        dialect.type_name(&column.column_type)
    );
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.unique {
        sql.push_str(" UNIQUE");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&dialect.literal(default)?);
    }
    Ok(sql)
}

/// Quoted column list and `VALUES` tuples of an insert
pub(crate) fn insert_prefix(
    dialect: &dyn SqlDialect,
    insert: &InsertRows,
) -> SqlResult<(String, String)> {
    if insert.columns.is_empty() || insert.rows.is_empty() {
        return Err(invalid(format!(
            "insert into {} needs at least one column and one row",
            insert.table
        )));
    }

    let mut tuples = Vec::with_capacity(insert.rows.len());
    for (i, row) in insert.rows.iter().enumerate() {
        if row.len() != insert.columns.len() {
            return Err(invalid(format!(
                "insert into {}: row {} has {} values for {} columns",
                insert.table,
                i + 1,
                row.len(),
                insert.columns.len()
            )));
        }
        let values = row
            .iter()
            .map(|v| dialect.literal(v))
            .collect::<SqlResult<Vec<_>>>()?;
        tuples.push(format!("({})", values.join(", ")));
    }

    Ok((ident_list(dialect, &insert.columns), tuples.join(", ")))
}

fn create_index(index: &IndexDef, dialect: &dyn SqlDialect) -> SqlResult<RenderedStatement> {
    if index.columns.is_empty() {
        return Err(invalid(format!("index {} lists no columns", index.name)));
    }
    Ok(RenderedStatement::native(format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        dialect.quote_ident(&index.name),
        dialect.quote_ident(&index.table),
        ident_list(dialect, &index.columns)
    )))
}

fn rename_as_add(
    rename: &RenameAsAdd,
    dialect: &dyn SqlDialect,
) -> SqlResult<Vec<RenderedStatement>> {
    let column = &rename.column;
    check_descriptor(column)?;
    log::warn!(
        "Rename of {}.{} to {} is applied as an add; existing values are not copied",
        column.table,
        rename.legacy_column,
        column.column
    );

    let mut statements = vec![dialect.add_column_if_absent(column)?];
    if dialect.drops_legacy_columns() {
        statements.push(RenderedStatement::native(format!(
            "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
            dialect.quote_ident(&column.table),
            dialect.quote_ident(&rename.legacy_column)
        )));
    }
    Ok(statements)
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
