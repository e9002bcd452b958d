//! Read-only view of the ledger against the repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tm_core::Version;
use tm_db::Connection;
use tm_sql::dialect_for;

use crate::error::{MigrateError, MigrateResult};
use crate::repository::MigrationRepository;
use crate::runner::plan_unit;
use crate::tracker::{SchemaStateRecord, SchemaTracker};
use crate::unit::IdempotencyMode;

/// One repository unit and its ledger state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitStatus {
    pub version: Version,
    pub name: String,
    pub mode: IdempotencyMode,
    /// `None` while pending
    pub applied_at: Option<DateTime<Utc>>,
    pub reconciled: bool,
    pub checksum_drift: bool,
}

impl UnitStatus {
    pub fn is_pending(&self) -> bool {
        self.applied_at.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub units: Vec<UnitStatus>,
    /// Ledger rows with no matching unit in the repository
    pub unknown: Vec<SchemaStateRecord>,
}

impl StatusReport {
    pub fn pending(&self) -> impl Iterator<Item = &UnitStatus> {
        self.units.iter().filter(|u| u.is_pending())
    }
}

/// Compare the ledger with `repo` without creating or changing anything
pub fn status(
    conn: &mut dyn Connection,
    repo: &MigrationRepository,
    tracker: &SchemaTracker,
) -> MigrateResult<StatusReport> {
    let mut records = if tracker.ledger_exists(conn).map_err(MigrateError::Ledger)? {
        tracker.applied_records(conn).map_err(MigrateError::Ledger)?
    } else {
        Vec::new()
    };

    let adapter = dialect_for(repo.dialect());
    let mut units = Vec::with_capacity(repo.len());
    for unit in repo.list() {
        let record = records
            .iter()
            .position(|r| r.version == unit.version)
            .map(|idx| records.remove(idx));

        let checksum_drift = match record.as_ref().and_then(|r| r.checksum.as_deref()) {
            Some(recorded) => plan_unit(unit, adapter.as_ref())
                .map(|plan| plan.checksum != recorded)
                .unwrap_or(false),
            None => false,
        };

        units.push(UnitStatus {
            version: unit.version,
            name: unit.name.clone(),
            mode: unit.mode,
            applied_at: record.as_ref().map(|r| r.applied_at),
            reconciled: record.as_ref().is_some_and(|r| r.reconciled),
            checksum_drift,
        });
    }

    Ok(StatusReport {
        units,
        unknown: records,
    })
}
