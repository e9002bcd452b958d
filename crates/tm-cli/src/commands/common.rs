//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use tm_core::{Config, CoreError, Dialect};
use tm_db::{Connection, PostgresBackend, SqliteBackend};
use tm_migrate::{MigrationRepository, SchemaTracker};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main() exits without printing it.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Install the `log` backend. `RUST_LOG` wins over `--verbose`.
pub(crate) fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

/// Configuration, project root and flag overrides for one invocation
#[derive(Debug)]
pub(crate) struct Session {
    pub root: PathBuf,
    pub config: Config,
}

/// Load `tidemark.yml` (or the `--config` file), resolve the target and
/// apply command-line overrides.
///
/// Without a config file in the project directory the defaults are used.
pub(crate) fn load_session(global: &GlobalArgs) -> Result<Session> {
    let root = global.project_dir.clone();
    let base = match &global.config {
        Some(path) => Config::load(path).context("Failed to load configuration file")?,
        None => match Config::load_from_dir(&root) {
            Ok(config) => config,
            Err(CoreError::ConfigNotFound { path }) => {
                log::debug!("No config at {path}, using defaults");
                Config::default()
            }
            Err(e) => return Err(e).context("Failed to load project configuration"),
        },
    };

    let mut config = base
        .for_target(global.target.as_deref())
        .context("Failed to resolve target")?;
    if let Some(dialect) = global.dialect {
        config.dialect = dialect;
    }
    if let Some(path) = &global.database {
        config.database.path = path.clone();
    }
    if let Some(url) = &global.database_url {
        config.database.url = Some(url.clone());
    }
    config.validate().context("Invalid configuration")?;

    Ok(Session { root, config })
}

impl Session {
    pub(crate) fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Migration history: the configured directory, or the built-in catalog
    pub(crate) fn repository(&self) -> Result<MigrationRepository> {
        match self.config.migrations_dir_absolute(&self.root) {
            Some(dir) => MigrationRepository::from_dir(&dir, self.dialect())
                .with_context(|| format!("Failed to load migrations from {}", dir.display())),
            None => MigrationRepository::builtin(self.dialect())
                .context("Failed to load built-in migrations"),
        }
    }

    pub(crate) fn tracker(&self) -> SchemaTracker {
        SchemaTracker::new(&self.config.ledger_table, self.dialect())
    }

    /// Open a connection for the configured dialect
    pub(crate) fn connect(&self) -> Result<Box<dyn Connection>> {
        match self.dialect() {
            Dialect::Sqlite => {
                let path = self.config.database_path_absolute(&self.root);
                log::debug!("Opening SQLite database {}", path.display());
                let conn = open_sqlite(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                Ok(Box::new(conn))
            }
            Dialect::Postgres => {
                let url = self.config.database.url.as_deref().context(
                    "PostgreSQL needs a connection URL: set database.url, --database-url or DATABASE_URL",
                )?;
                let conn =
                    PostgresBackend::connect(url).context("Failed to connect to PostgreSQL")?;
                Ok(Box::new(conn))
            }
        }
    }
}

fn open_sqlite(path: &Path) -> tm_db::DbResult<SqliteBackend> {
    if path == Path::new(":memory:") {
        SqliteBackend::in_memory()
    } else {
        SqliteBackend::from_path(path)
    }
}

/// `2024-05-01 12:00:00` style timestamp for tables
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
