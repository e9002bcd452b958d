//! tm-db - Database abstraction layer for tidemark
//!
//! This crate provides the blocking [`Connection`] trait the migration
//! runner drives, with implementations for SQLite (embedded) and
//! PostgreSQL (server). Backend errors are classified into an
//! [`ErrorClass`] so callers can tell "object already exists" apart from
//! genuine failures without parsing driver messages themselves.

pub mod error;
pub mod postgres;
pub mod sqlite;
pub mod traits;
pub mod value;

pub use error::{DbError, DbResult, ErrorClass};
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;
pub use traits::Connection;
pub use value::SqlValue;
