//! Configuration types and parsing for tidemark.yml

use crate::dialect::Dialect;
use crate::error::{CoreError, CoreResult};
use crate::serde_helpers::default_true;
use crate::sql_utils::is_plain_identifier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Migration engine configuration from tidemark.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Target SQL dialect
    #[serde(default)]
    pub dialect: Dialect,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log reconciled duplicates as warnings instead of informational
    /// messages. Reconciled duplicates never abort a run in either mode.
    #[serde(default)]
    pub strict_mode: bool,

    /// How long to wait for the migration lock (and for other lock waits)
    /// before giving up, in milliseconds
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Upper bound on a single statement's execution time, in milliseconds.
    /// `0` disables the bound.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Name of the ledger table recording applied versions
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,

    /// Run each unit inside one transaction when the engine supports
    /// transactional DDL
    #[serde(default = "default_true")]
    pub transactional: bool,

    /// Directory of YAML migration units. The built-in catalog is used when
    /// unset.
    #[serde(default)]
    pub migrations_dir: Option<String>,

    /// Named target configurations (e.g., dev, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database file path for the embedded dialect (or `:memory:`)
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Connection URL for the server dialect
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            url: None,
        }
    }
}

/// Target-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Dialect override
    #[serde(default)]
    pub dialect: Option<Dialect>,

    /// Database configuration override
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Strict mode override
    #[serde(default)]
    pub strict_mode: Option<bool>,
}

const DEFAULT_DB_PATH: &str = "tidemark.db";

const DEFAULT_LEDGER_TABLE: &str = "schema_migrations";

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_ledger_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

fn default_lock_timeout_ms() -> u64 {
    10_000
}

fn default_statement_timeout_ms() -> u64 {
    60_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            database: DatabaseConfig::default(),
            strict_mode: false,
            lock_timeout_ms: default_lock_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
            ledger_table: default_ledger_table(),
            transactional: true,
            migrations_dir: None,
            targets: HashMap::new(),
        }
    }
}

impl Config {
    /// Default configuration for a dialect, as used by embedding applications
    /// that call the engine directly at startup.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tidemark.yml or tidemark.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tidemark.yml");
        let yaml_path = dir.join("tidemark.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if !is_plain_identifier(&self.ledger_table) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "ledger_table '{}' must be a plain identifier ([A-Za-z_][A-Za-z0-9_]*)",
                    self.ledger_table
                ),
            });
        }

        if self.lock_timeout_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock_timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.database.path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }

        for (name, target) in &self.targets {
            if let Some(db) = &target.database {
                if db.path.trim().is_empty() {
                    return Err(CoreError::ConfigInvalid {
                        message: format!("targets.{name}.database.path cannot be empty"),
                    });
                }
            }
        }

        Ok(())
    }

    /// Get the list of available target names, sorted
    pub fn available_targets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.targets.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Return the effective configuration for a named target.
    ///
    /// `None` returns the base configuration unchanged. Target fields that are
    /// set replace the base values.
    pub fn for_target(&self, target: Option<&str>) -> CoreResult<Config> {
        let Some(name) = target else {
            return Ok(self.clone());
        };
        let overrides = self
            .targets
            .get(name)
            .ok_or_else(|| CoreError::UnknownTarget {
                name: name.to_string(),
                available: if self.targets.is_empty() {
                    "(none)".to_string()
                } else {
                    self.available_targets().join(", ")
                },
            })?;

        let mut resolved = self.clone();
        if let Some(dialect) = overrides.dialect {
            resolved.dialect = dialect;
        }
        if let Some(database) = &overrides.database {
            resolved.database = database.clone();
        }
        if let Some(strict) = overrides.strict_mode {
            resolved.strict_mode = strict;
        }
        Ok(resolved)
    }

    /// Lock wait bound as a [`Duration`]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Per-statement bound as a [`Duration`], `None` when disabled
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_ms > 0).then(|| Duration::from_millis(self.statement_timeout_ms))
    }

    /// Get the absolute migrations directory relative to a project root
    pub fn migrations_dir_absolute(&self, root: &Path) -> Option<PathBuf> {
        self.migrations_dir.as_ref().map(|dir| root.join(dir))
    }

    /// Get the absolute database path relative to a project root.
    ///
    /// `:memory:` is returned unchanged.
    pub fn database_path_absolute(&self, root: &Path) -> PathBuf {
        if self.database.path == ":memory:" {
            PathBuf::from(":memory:")
        } else {
            root.join(&self.database.path)
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
