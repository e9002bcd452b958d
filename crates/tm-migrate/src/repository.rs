//! Migration script repository.
//!
//! Holds the ordered history of units for one dialect. Loading is pure: it
//! reads static definitions (or YAML files) and never touches a database.

use std::path::Path;

use serde::Deserialize;
use tm_core::{Dialect, Version};
use tm_sql::LogicalOperation;

use crate::catalog;
use crate::error::LoadError;
use crate::unit::{IdempotencyMode, MigrationUnit};

/// Ordered, validated migration units for one dialect
#[derive(Debug, Clone)]
pub struct MigrationRepository {
    dialect: Dialect,
    units: Vec<MigrationUnit>,
}

impl MigrationRepository {
    /// Validate `units` and keep the history for `dialect`.
    ///
    /// Portable units and units bound to `dialect` are kept; units bound to
    /// another dialect are dropped. The result is sorted by version. Empty
    /// units, duplicate versions and a version defined both portably and for
    /// `dialect` are rejected.
    pub fn load(units: Vec<MigrationUnit>, dialect: Dialect) -> Result<Self, LoadError> {
        if let Some(empty) = units.iter().find(|u| u.statements.is_empty()) {
            return Err(LoadError::EmptyUnit {
                version: empty.version,
                name: empty.name.clone(),
            });
        }

        let mut kept: Vec<MigrationUnit> =
            units.into_iter().filter(|u| u.applies_to(dialect)).collect();
        kept.sort_by_key(|u| u.version);

        for pair in kept.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            if first.version != second.version {
                continue;
            }
            if first.dialect.is_some() != second.dialect.is_some() {
                return Err(LoadError::ConflictingVariants {
                    version: first.version,
                    dialect,
                });
            }
            return Err(LoadError::DuplicateVersion {
                version: first.version,
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }

        log::debug!(
            "Loaded {} migration unit(s) for {}",
            kept.len(),
            dialect
        );
        Ok(Self {
            dialect,
            units: kept,
        })
    }

    /// The built-in schema history
    pub fn builtin(dialect: Dialect) -> Result<Self, LoadError> {
        Self::load(catalog::units(), dialect)
    }

    /// Load every `*.yml` / `*.yaml` file in `dir`, one unit per file.
    ///
    /// A file may omit `version` when its name starts with one
    /// (`004_add_blog_features.yml`) and `name` defaults to the file stem.
    pub fn from_dir(dir: &Path, dialect: Dialect) -> Result<Self, LoadError> {
        let entries = std::fs::read_dir(dir).map_err(|e| LoadError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| LoadError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if path.is_file() && is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let units = paths
            .iter()
            .map(|path| load_unit_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Read {} migration file(s) from {}", units.len(), dir.display());
        Self::load(units, dialect)
    }

    /// Target dialect of this history
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Units in ascending version order
    pub fn list(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Look up a unit by version
    pub fn get(&self, version: Version) -> Option<&MigrationUnit> {
        self.units
            .binary_search_by_key(&version, |u| u.version)
            .ok()
            .map(|idx| &self.units[idx])
    }

    /// All versions in ascending order
    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.units.iter().map(|u| u.version)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// On-disk unit; `version` and `name` may come from the file name
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitFile {
    #[serde(default)]
    version: Option<Version>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mode: IdempotencyMode,
    #[serde(default)]
    dialect: Option<Dialect>,
    statements: Vec<LogicalOperation>,
}

fn load_unit_file(path: &Path) -> Result<MigrationUnit, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file: UnitFile = serde_yaml::from_str(&content).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let version = match file.version {
        Some(v) => v,
        None => stem
            .parse::<Version>()
            .map_err(|e| LoadError::MissingVersion {
                path: path.to_path_buf(),
                source: e,
            })?,
    };
    let name = file.name.unwrap_or_else(|| match stem.split_once(['_', '-', '.']) {
        Some((prefix, rest)) if prefix.parse::<Version>().is_ok() => rest.to_string(),
        _ => stem.clone(),
    });

    Ok(MigrationUnit {
        version,
        name,
        mode: file.mode,
        dialect: file.dialect,
        statements: file.statements,
    })
}

#[cfg(test)]
#[path = "repository_test.rs"]
mod tests;
