//! Dialect-agnostic schema operations.
//!
//! A migration unit is a list of [`LogicalOperation`]s. Each operation states
//! the *intent* of a change (create a table unless it exists, add a column
//! unless it exists, insert rows unless they conflict) and is resolved into
//! concrete SQL by a [`crate::SqlDialect`]. Operations deserialize from YAML
//! with an `op:` tag so units can also be authored as files.

use serde::{Deserialize, Serialize};
use tm_core::Dialect;

/// Logical column type, mapped to a concrete type name per dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Autoincrementing integer primary key
    AutoId,
    Integer,
    BigInt,
    Real,
    Boolean,
    Text,
    Varchar(u32),
    /// Timestamp without time zone
    Timestamp,
    /// Timestamp with time zone
    TimestampTz,
}

/// SQL expressions allowed as column defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlExpr {
    CurrentTimestamp,
}

/// Literal value used in defaults and inserted rows.
///
/// In YAML, `~` is `Null`, booleans and numbers map directly, the string
/// `current_timestamp` is [`SqlExpr::CurrentTimestamp`], and any other string
/// is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Expr(SqlExpr),
    Text(String),
}

impl Literal {
    /// Text literal shorthand.
    pub fn text(value: impl Into<String>) -> Self {
        Literal::Text(value.into())
    }

    /// Whether the literal is a constant (not an expression evaluated by the
    /// engine).
    pub fn is_constant(&self) -> bool {
        !matches!(self, Literal::Expr(_))
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

/// `ON DELETE` behaviour of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// Single-column foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
}

/// Column inside a `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Literal>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub references: Option<ForeignKey>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    /// Nullable column with no default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            unique: false,
            primary_key: false,
            references: None,
        }
    }

    /// Autoincrementing `id` primary key.
    pub fn id() -> Self {
        Self::new("id", ColumnType::AutoId)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, value: impl Into<Literal>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default = Some(Literal::Expr(SqlExpr::CurrentTimestamp));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn references(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        on_delete: Option<ReferentialAction>,
    ) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            on_delete,
        });
        self
    }
}

/// Table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum TableConstraint {
    PrimaryKey {
        columns: Vec<String>,
    },
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        references_table: String,
        references_columns: Vec<String>,
        #[serde(default)]
        on_delete: Option<ReferentialAction>,
    },
}

/// `CREATE TABLE IF NOT EXISTS` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDef {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub constraints: Vec<TableConstraint>,
}

impl TableDef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Column to add to an existing table when absent.
///
/// Descriptors only live for the duration of a run; they carry no identity
/// beyond `(table, column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDescriptor {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub default: Option<Literal>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
}

impl ColumnDescriptor {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            column_type,
            default: None,
            nullable: true,
            unique: false,
        }
    }

    pub fn default(mut self, value: impl Into<Literal>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Rows to insert, skipping rows that violate a uniqueness guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertRows {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Literal>>,
    /// Columns of the unique constraint acting as the idempotency guard.
    /// Empty means "any conflict".
    #[serde(default)]
    pub conflict_columns: Vec<String>,
}

impl InsertRows {
    pub fn new<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            conflict_columns: Vec::new(),
        }
    }

    pub fn row<I, L>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_conflict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexDef {
    pub fn new<I, S>(name: impl Into<String>, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A column that used to be called `legacy_column` and is now expected as
/// `column.column`.
///
/// Rename history is not reconstructed: the new column is added (when
/// absent) and each dialect decides whether the legacy column is dropped.
/// Data in the legacy column is never copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameAsAdd {
    pub legacy_column: String,
    pub column: ColumnDescriptor,
}

/// Authored SQL, optionally bound to one dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSql {
    pub sql: String,
    #[serde(default)]
    pub dialect: Option<Dialect>,
}

/// One logical schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogicalOperation {
    CreateTableIfAbsent(TableDef),
    AddColumnIfAbsent(ColumnDescriptor),
    InsertIgnoringConflict(InsertRows),
    CreateIndexIfAbsent(IndexDef),
    RenameAsAdd(RenameAsAdd),
    Raw(RawSql),
}

impl LogicalOperation {
    /// Portable raw statement.
    pub fn raw(sql: impl Into<String>) -> Self {
        LogicalOperation::Raw(RawSql {
            sql: sql.into(),
            dialect: None,
        })
    }

    /// Raw statement that only runs on `dialect`.
    pub fn raw_for(dialect: Dialect, sql: impl Into<String>) -> Self {
        LogicalOperation::Raw(RawSql {
            sql: sql.into(),
            dialect: Some(dialect),
        })
    }

    /// Short human-readable label for logs and plans.
    pub fn describe(&self) -> String {
        match self {
            LogicalOperation::CreateTableIfAbsent(t) => format!("create table {}", t.table),
            LogicalOperation::AddColumnIfAbsent(c) => {
                format!("add column {}.{}", c.table, c.column)
            }
            LogicalOperation::InsertIgnoringConflict(i) => {
                format!("insert {} row(s) into {}", i.rows.len(), i.table)
            }
            LogicalOperation::CreateIndexIfAbsent(i) => {
                format!("create index {} on {}", i.name, i.table)
            }
            LogicalOperation::RenameAsAdd(r) => format!(
                "add column {}.{} (formerly {})",
                r.column.table, r.column.column, r.legacy_column
            ),
            LogicalOperation::Raw(r) => match r.dialect {
                Some(d) => format!("raw sql ({d})"),
                None => "raw sql".to_string(),
            },
        }
    }
}
