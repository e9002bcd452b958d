//! Migration runner state machine.
//!
//! A run walks `Idle -> Loading -> Diffing -> Planning` and then
//! `Applying(v) -> Recording(v)` for each pending unit before reaching
//! `Done`. Any error moves it to `TerminatedFailure`; no later unit is
//! attempted and the ledger only ever holds units whose statements all
//! succeeded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tm_core::{compute_checksum, Config, Dialect, Version};
use tm_db::{Connection, DbError};
use tm_sql::{dialect_for, render, Guard, RenderedStatement, SqlDialect};

use crate::error::{LoadError, MigrateError, MigrateResult};
use crate::reconciler::{classify, may_reconcile, Reconciliation};
use crate::report::{MigrationReport, ReconciledStatement};
use crate::repository::MigrationRepository;
use crate::tracker::{SchemaStateRecord, SchemaTracker};
use crate::unit::{IdempotencyMode, MigrationUnit};

const STATEMENT_SAVEPOINT: &str = "tm_stmt";

/// Where a run is (or stopped)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Loading,
    Diffing,
    Planning,
    Applying(Version),
    Recording(Version),
    Done,
    TerminatedFailure,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Loading => f.write_str("loading"),
            RunState::Diffing => f.write_str("diffing"),
            RunState::Planning => f.write_str("planning"),
            RunState::Applying(v) => write!(f, "applying({v})"),
            RunState::Recording(v) => write!(f, "recording({v})"),
            RunState::Done => f.write_str("done"),
            RunState::TerminatedFailure => f.write_str("terminated_failure"),
        }
    }
}

/// A failed run: the error, what succeeded before it, and where it stopped
#[derive(Debug)]
pub struct RunFailure {
    pub error: MigrateError,
    pub report: MigrationReport,
    /// State the run was in when the error occurred
    pub state: RunState,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migration run failed while {}: {}", self.state, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A unit rendered for one dialect, ready to execute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedUnit {
    pub version: Version,
    pub name: String,
    pub mode: IdempotencyMode,
    pub statements: Vec<PlannedStatement>,
    pub checksum: String,
}

/// A rendered statement tagged with the operation it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStatement {
    /// 1-based position of the source operation in the unit
    pub operation_index: usize,
    pub sql: String,
    pub guard: Guard,
}

impl PlannedStatement {
    fn new(operation_index: usize, rendered: RenderedStatement) -> Self {
        Self {
            operation_index,
            sql: rendered.sql,
            guard: rendered.guard,
        }
    }
}

/// Render and validate every operation of `unit`.
///
/// The checksum covers the rendered SQL, so it changes whenever the unit or
/// the dialect rendering of it changes. A unit whose operations are all
/// bound to other dialects renders nothing and is rejected as empty.
pub fn plan_unit(unit: &MigrationUnit, dialect: &dyn SqlDialect) -> MigrateResult<PlannedUnit> {
    let mut statements = Vec::new();
    for (idx, op) in unit.statements.iter().enumerate() {
        let operation_index = idx + 1;
        let rendered = render(op, dialect).map_err(|source| MigrateError::Render {
            version: unit.version,
            statement_index: operation_index,
            dialect: dialect.kind(),
            source,
        })?;
        statements.extend(
            rendered
                .into_iter()
                .map(|r| PlannedStatement::new(operation_index, r)),
        );
    }
    if statements.is_empty() {
        return Err(LoadError::EmptyUnit {
            version: unit.version,
            name: unit.name.clone(),
        }
        .into());
    }

    let joined = statements
        .iter()
        .map(|s| s.sql.as_str())
        .collect::<Vec<_>>()
        .join("\n;\n");
    Ok(PlannedUnit {
        version: unit.version,
        name: unit.name.clone(),
        mode: unit.mode,
        checksum: compute_checksum(&joined),
        statements,
    })
}

/// Apply the built-in catalog for `dialect` with default settings.
///
/// Entry point for hosting applications at startup.
pub fn run_migrations(
    conn: &mut dyn Connection,
    dialect: Dialect,
) -> Result<MigrationReport, RunFailure> {
    let repo = MigrationRepository::builtin(dialect).map_err(|e| RunFailure {
        error: e.into(),
        report: MigrationReport::default(),
        state: RunState::Loading,
    })?;
    MigrationRunner::new(Config::for_dialect(dialect)).run(conn, &repo)
}

/// Progress of one run
struct RunContext {
    state: RunState,
    report: MigrationReport,
    last_applied_at: Option<DateTime<Utc>>,
}

impl RunContext {
    fn enter(&mut self, next: RunState) {
        log::debug!("Migration run: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Ledger timestamp never earlier than any previous record
    fn next_applied_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_applied_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last_applied_at = Some(at);
        at
    }
}

/// Drives migration runs for one configuration
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    config: Config,
}

impl MigrationRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn tracker(&self, dialect: Dialect) -> SchemaTracker {
        SchemaTracker::new(&self.config.ledger_table, dialect)
    }

    /// Apply every pending unit of `repo`, in version order
    pub fn run(
        &self,
        conn: &mut dyn Connection,
        repo: &MigrationRepository,
    ) -> Result<MigrationReport, RunFailure> {
        let started = Instant::now();
        let mut ctx = RunContext {
            state: RunState::Idle,
            report: MigrationReport::default(),
            last_applied_at: None,
        };

        let result = self.drive(conn, repo, &mut ctx);
        ctx.report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                ctx.enter(RunState::Done);
                log::info!("Migrations complete: {}", ctx.report.summary());
                Ok(ctx.report)
            }
            Err(error) => {
                let state = ctx.state;
                ctx.enter(RunState::TerminatedFailure);
                log::debug!("Migration run aborted: {error}");
                Err(RunFailure {
                    error,
                    report: ctx.report,
                    state,
                })
            }
        }
    }

    /// Pending units of `repo`, rendered but not executed.
    ///
    /// Read-only: a missing ledger means every unit is pending.
    pub fn plan(
        &self,
        conn: &mut dyn Connection,
        repo: &MigrationRepository,
    ) -> MigrateResult<Vec<PlannedUnit>> {
        let tracker = self.tracker(repo.dialect());
        let applied = read_ledger(conn, &tracker)?;
        let adapter = dialect_for(repo.dialect());
        repo.list()
            .iter()
            .filter(|u| !applied.iter().any(|r| r.version == u.version))
            .map(|u| plan_unit(u, adapter.as_ref()))
            .collect()
    }

    fn drive(
        &self,
        conn: &mut dyn Connection,
        repo: &MigrationRepository,
        ctx: &mut RunContext,
    ) -> MigrateResult<()> {
        ctx.enter(RunState::Loading);
        if repo.dialect() != conn.dialect() {
            return Err(MigrateError::DialectMismatch {
                repository: repo.dialect(),
                connection: conn.dialect(),
            });
        }
        log::debug!(
            "Loaded {} migration unit(s) for {} ({})",
            repo.len(),
            repo.dialect(),
            conn.backend()
        );

        conn.set_timeouts(self.config.statement_timeout(), self.config.lock_timeout())
            .map_err(MigrateError::Connection)?;

        let lock_key = self.config.ledger_table.as_str();
        conn.acquire_migration_lock(lock_key)
            .map_err(MigrateError::Lock)?;
        let result = self.drive_locked(conn, repo, ctx);
        if let Err(e) = conn.release_migration_lock(lock_key) {
            log::warn!("Failed to release migration lock {lock_key}: {e}");
        }
        result
    }

    fn drive_locked(
        &self,
        conn: &mut dyn Connection,
        repo: &MigrationRepository,
        ctx: &mut RunContext,
    ) -> MigrateResult<()> {
        ctx.enter(RunState::Diffing);
        let tracker = self.tracker(repo.dialect());
        let applied: BTreeMap<Version, SchemaStateRecord> = read_ledger(conn, &tracker)?
            .into_iter()
            .map(|r| (r.version, r))
            .collect();

        let known: BTreeSet<Version> = repo.versions().collect();
        for version in applied.keys().filter(|v| !known.contains(v)) {
            log::warn!("Ledger records {version}, which is not a known migration");
        }

        let (done, pending): (Vec<&MigrationUnit>, Vec<&MigrationUnit>) = repo
            .list()
            .iter()
            .partition(|u| applied.contains_key(&u.version));
        ctx.report.skipped_versions = done.iter().map(|u| u.version).collect();
        ctx.last_applied_at = applied.values().map(|r| r.applied_at).max();
        log::debug!(
            "{} pending, {} already applied",
            pending.len(),
            done.len()
        );

        ctx.enter(RunState::Planning);
        let adapter = dialect_for(repo.dialect());
        for unit in &done {
            let Some(recorded) = applied
                .get(&unit.version)
                .and_then(|r| r.checksum.as_deref())
            else {
                continue;
            };
            match plan_unit(unit, adapter.as_ref()) {
                Ok(plan) if plan.checksum != recorded => {
                    log::warn!(
                        "Migration {} changed after it was applied (checksum drift); it will not be re-run",
                        unit.label()
                    );
                    ctx.report.checksum_drift.push(unit.version);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Cannot verify checksum of {}: {e}", unit.label()),
            }
        }

        let plans = pending
            .iter()
            .map(|u| plan_unit(u, adapter.as_ref()))
            .collect::<MigrateResult<Vec<_>>>()?;

        tracker.ensure_ledger(conn).map_err(MigrateError::Ledger)?;

        let atomic = conn.supports_transactional_ddl() && self.config.transactional;
        for plan in &plans {
            ctx.enter(RunState::Applying(plan.version));
            if atomic {
                self.apply_atomic(conn, &tracker, plan, ctx)?;
            } else {
                self.apply_sequential(conn, &tracker, plan, ctx)?;
            }
            ctx.report.applied_versions.push(plan.version);
            log::info!(
                "Applied {} {} ({} statement(s))",
                plan.version,
                plan.name,
                plan.statements.len()
            );
        }
        Ok(())
    }

    /// Unit and ledger row in one transaction
    fn apply_atomic(
        &self,
        conn: &mut dyn Connection,
        tracker: &SchemaTracker,
        plan: &PlannedUnit,
        ctx: &mut RunContext,
    ) -> MigrateResult<()> {
        conn.begin().map_err(MigrateError::Connection)?;
        // Reconciliations of a rolled-back unit are not part of the report.
        let reconciled_mark = ctx.report.reconciled.len();

        for statement in &plan.statements {
            if let Err(e) = self.execute_statement(conn, plan, statement, true, ctx) {
                rollback_quietly(conn, plan.version);
                ctx.report.reconciled.truncate(reconciled_mark);
                return Err(statement_error(plan, statement.operation_index, e));
            }
        }

        ctx.enter(RunState::Recording(plan.version));
        let record = self.record_for(plan, ctx);
        if let Err(e) = tracker.record_applied(conn, &record) {
            rollback_quietly(conn, plan.version);
            ctx.report.reconciled.truncate(reconciled_mark);
            return Err(MigrateError::Ledger(e));
        }
        if let Err(e) = conn.commit() {
            rollback_quietly(conn, plan.version);
            ctx.report.reconciled.truncate(reconciled_mark);
            return Err(MigrateError::Connection(e));
        }
        Ok(())
    }

    /// Statements one by one; a mid-unit failure leaves the schema changed
    fn apply_sequential(
        &self,
        conn: &mut dyn Connection,
        tracker: &SchemaTracker,
        plan: &PlannedUnit,
        ctx: &mut RunContext,
    ) -> MigrateResult<()> {
        for (applied, statement) in plan.statements.iter().enumerate() {
            if let Err(source) = self.execute_statement(conn, plan, statement, false, ctx) {
                if applied == 0 {
                    return Err(statement_error(plan, statement.operation_index, source));
                }
                return Err(MigrateError::PartialApplication {
                    version: plan.version,
                    statement_index: statement.operation_index,
                    applied_statements: applied,
                    source,
                });
            }
        }

        ctx.enter(RunState::Recording(plan.version));
        let record = self.record_for(plan, ctx);
        tracker.record_applied(conn, &record).map_err(|source| {
            log::error!(
                "Migration {} {} changed the schema but was NOT recorded in the ledger; \
                 record it manually before re-running",
                plan.version,
                plan.name
            );
            MigrateError::LedgerWrite {
                version: plan.version,
                source,
            }
        })
    }

    /// Run one statement, reconciling an ignorable duplicate failure.
    ///
    /// Inside a transaction a reconcilable statement runs under a savepoint
    /// so its failure can be undone without aborting the transaction.
    fn execute_statement(
        &self,
        conn: &mut dyn Connection,
        plan: &PlannedUnit,
        statement: &PlannedStatement,
        in_transaction: bool,
        ctx: &mut RunContext,
    ) -> Result<(), DbError> {
        let index = statement.operation_index;
        log::debug!("{} statement {}: {}", plan.version, index, statement.sql);
        let savepoint = in_transaction && may_reconcile(plan.mode, statement.guard);
        if savepoint {
            conn.savepoint(STATEMENT_SAVEPOINT)?;
        }

        match conn.execute(&statement.sql) {
            Ok(()) => {
                if savepoint {
                    conn.release(STATEMENT_SAVEPOINT)?;
                }
                Ok(())
            }
            Err(e) => match classify(&e, plan.mode, statement.guard) {
                Reconciliation::Fatal => Err(e),
                Reconciliation::IgnorableDuplicate => {
                    if savepoint {
                        conn.rollback_to(STATEMENT_SAVEPOINT)?;
                        conn.release(STATEMENT_SAVEPOINT)?;
                    }
                    self.note_reconciled(plan, index, &e, ctx);
                    Ok(())
                }
            },
        }
    }

    fn note_reconciled(&self, plan: &PlannedUnit, index: usize, err: &DbError, ctx: &mut RunContext) {
        if self.config.strict_mode {
            log::warn!(
                "{} statement {} reconciled: object already exists ({})",
                plan.version,
                index,
                err
            );
        } else {
            log::info!(
                "{} statement {} reconciled: object already exists ({})",
                plan.version,
                index,
                err.class()
            );
        }
        ctx.report.reconciled.push(ReconciledStatement {
            version: plan.version,
            statement_index: index,
            class: err.class().to_string(),
        });
    }

    fn record_for(&self, plan: &PlannedUnit, ctx: &mut RunContext) -> SchemaStateRecord {
        let reconciled = ctx
            .report
            .reconciled
            .iter()
            .any(|r| r.version == plan.version);
        SchemaStateRecord {
            version: plan.version,
            name: plan.name.clone(),
            checksum: Some(plan.checksum.clone()),
            applied_at: ctx.next_applied_at(),
            reconciled,
        }
    }
}

/// Ledger rows without creating the ledger
fn read_ledger(
    conn: &mut dyn Connection,
    tracker: &SchemaTracker,
) -> MigrateResult<Vec<SchemaStateRecord>> {
    if !tracker.ledger_exists(conn).map_err(MigrateError::Ledger)? {
        return Ok(Vec::new());
    }
    tracker.applied_records(conn).map_err(MigrateError::Ledger)
}

fn rollback_quietly(conn: &mut dyn Connection, version: Version) {
    if let Err(e) = conn.rollback() {
        log::warn!("Rollback of {version} failed: {e}");
    }
}

fn statement_error(plan: &PlannedUnit, statement_index: usize, source: DbError) -> MigrateError {
    let class = source.class();
    if class == tm_db::ErrorClass::Timeout {
        MigrateError::Timeout {
            version: plan.version,
            statement_index,
            source,
        }
    } else if class.is_duplicate() {
        MigrateError::AlreadyExists {
            version: plan.version,
            statement_index,
            mode: plan.mode,
            source,
        }
    } else {
        MigrateError::StatementFailed {
            version: plan.version,
            statement_index,
            source,
        }
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
