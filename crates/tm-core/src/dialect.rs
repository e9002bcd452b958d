//! Target database dialects.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect of the database a migration run targets.
///
/// `Sqlite` is the embedded, file-backed engine: limited `ALTER TABLE`, no
/// conditional column addition, integer booleans, `INSERT OR IGNORE`.
/// `Postgres` is the server engine: transactional DDL, native booleans,
/// `ON CONFLICT ... DO NOTHING` and procedural `DO` blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded file database (SQLite)
    #[default]
    #[serde(alias = "file_embedded", alias = "sqlite3")]
    Sqlite,
    /// Server relational database (PostgreSQL)
    #[serde(alias = "server_relational", alias = "postgresql")]
    Postgres,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 2] = [Dialect::Sqlite, Dialect::Postgres];

    /// Stable lowercase name used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" | "file_embedded" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "server_relational" => Ok(Dialect::Postgres),
            _ => Err(CoreError::UnknownDialect {
                name: s.to_string(),
            }),
        }
    }
}
