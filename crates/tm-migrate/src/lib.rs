//! tm-migrate - Schema migration engine for tidemark
//!
//! Discovers versioned [`MigrationUnit`]s, diffs them against the ledger
//! kept by the [`SchemaTracker`], renders every pending unit for the target
//! dialect and applies them in order, recording each unit only after all of
//! its statements succeeded. Duplicate-object failures on units that
//! tolerate them are reconciled instead of aborting the run.
//!
//! Hosting applications call [`run_migrations`] at startup; the `tidemark`
//! binary drives [`MigrationRunner`] directly.

pub mod catalog;
pub mod error;
pub mod reconciler;
pub mod report;
pub mod repository;
pub mod runner;
pub mod status;
pub mod tracker;
pub mod unit;

pub use error::{LoadError, MigrateError, MigrateResult};
pub use reconciler::{classify, Reconciliation};
pub use report::{MigrationReport, ReconciledStatement};
pub use repository::MigrationRepository;
pub use runner::{
    plan_unit, run_migrations, MigrationRunner, PlannedStatement, PlannedUnit, RunFailure, RunState,
};
pub use status::{status, StatusReport, UnitStatus};
pub use tracker::{SchemaStateRecord, SchemaTracker};
pub use unit::{IdempotencyMode, MigrationUnit};
