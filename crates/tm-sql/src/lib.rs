//! tm-sql - Dialect adapter for tidemark
//!
//! Migration units describe schema changes as dialect-agnostic
//! [`LogicalOperation`]s. This crate renders them into concrete statements
//! for the target engine and validates every statement with the dialect's
//! `sqlparser` tokenizer before anything reaches a database.

pub mod dialect;
pub mod error;
pub mod operation;
pub mod render;
pub mod validator;

pub use dialect::{dialect_for, PostgresDialect, SqlDialect, SqliteDialect};
pub use error::{SqlError, SqlResult};
pub use operation::{
    ColumnDef, ColumnDescriptor, ColumnType, ForeignKey, IndexDef, InsertRows, Literal,
    LogicalOperation, RawSql, ReferentialAction, RenameAsAdd, SqlExpr, TableConstraint, TableDef,
};
pub use render::{render, render_all, Guard, RenderedStatement};
pub use validator::validate_statement;
