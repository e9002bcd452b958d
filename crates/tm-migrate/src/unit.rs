//! Migration units.

use std::fmt;

use serde::{Deserialize, Serialize};
use tm_core::{Dialect, Version};
use tm_sql::{ColumnDescriptor, IndexDef, InsertRows, LogicalOperation, RenameAsAdd, TableDef};

/// How a unit behaves when its changes are already (partly) present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyMode {
    /// Every statement carries its own guard (`IF NOT EXISTS`,
    /// `ON CONFLICT`, information-schema probe)
    #[default]
    NativeGuarded,
    /// Run and tolerate "already exists" failures
    BestEffort,
    /// Must never run twice; any failure is fatal
    Unguarded,
}

impl IdempotencyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IdempotencyMode::NativeGuarded => "native_guarded",
            IdempotencyMode::BestEffort => "best_effort",
            IdempotencyMode::Unguarded => "unguarded",
        }
    }
}

impl fmt::Display for IdempotencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned, named list of logical schema operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationUnit {
    pub version: Version,
    pub name: String,
    #[serde(default)]
    pub mode: IdempotencyMode,
    /// Restrict the unit to one dialect; `None` means portable
    #[serde(default)]
    pub dialect: Option<Dialect>,
    pub statements: Vec<LogicalOperation>,
}

impl MigrationUnit {
    /// Create an empty, portable, natively guarded unit
    pub fn new(version: u32, name: impl Into<String>) -> Self {
        Self {
            version: Version::new(version),
            name: name.into(),
            mode: IdempotencyMode::NativeGuarded,
            dialect: None,
            statements: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: IdempotencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Bind the unit to a single dialect
    pub fn only_for(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn op(mut self, op: LogicalOperation) -> Self {
        self.statements.push(op);
        self
    }

    pub fn create_table(self, table: TableDef) -> Self {
        self.op(LogicalOperation::CreateTableIfAbsent(table))
    }

    pub fn add_column(self, column: ColumnDescriptor) -> Self {
        self.op(LogicalOperation::AddColumnIfAbsent(column))
    }

    pub fn insert(self, rows: InsertRows) -> Self {
        self.op(LogicalOperation::InsertIgnoringConflict(rows))
    }

    pub fn index(self, index: IndexDef) -> Self {
        self.op(LogicalOperation::CreateIndexIfAbsent(index))
    }

    pub fn rename_as_add(self, legacy_column: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.op(LogicalOperation::RenameAsAdd(RenameAsAdd {
            legacy_column: legacy_column.into(),
            column,
        }))
    }

    pub fn raw(self, sql: impl Into<String>) -> Self {
        self.op(LogicalOperation::raw(sql))
    }

    /// Whether the unit is part of the history for `dialect`
    pub fn applies_to(&self, dialect: Dialect) -> bool {
        !matches!(self.dialect, Some(bound) if bound != dialect)
    }

    /// `v003 seed_default_roles` style label
    pub fn label(&self) -> String {
        format!("{} {}", self.version, self.name)
    }
}
