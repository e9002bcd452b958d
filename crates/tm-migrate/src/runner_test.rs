use super::*;
use chrono::TimeZone;
use std::time::Duration;
use tm_db::{DbResult, ErrorClass, SqlValue};
use tm_sql::ColumnDescriptor;
use tm_sql::ColumnType;
use tm_sql::LogicalOperation;

/// In-memory connection that records every statement and fails the ones
/// matching a scripted pattern
struct ScriptedConnection {
    dialect: Dialect,
    transactional: bool,
    executed: Vec<String>,
    failures: Vec<(String, ErrorClass)>,
    ledger_created: bool,
    ledger: Vec<SchemaStateRecord>,
    staged: Vec<SchemaStateRecord>,
    in_transaction: bool,
    fail_ledger_insert: bool,
    fail_lock: bool,
    lock_events: Vec<&'static str>,
    timeouts: Option<(Option<Duration>, Duration)>,
}

impl ScriptedConnection {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            transactional: false,
            executed: Vec::new(),
            failures: Vec::new(),
            ledger_created: false,
            ledger: Vec::new(),
            staged: Vec::new(),
            in_transaction: false,
            fail_ledger_insert: false,
            fail_lock: false,
            lock_events: Vec::new(),
            timeouts: None,
        }
    }

    fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    fn fail_on(mut self, pattern: &str, class: ErrorClass) -> Self {
        self.failures.push((pattern.to_string(), class));
        self
    }

    fn with_applied(mut self, versions: &[u32]) -> Self {
        self.ledger_created = true;
        for (i, v) in versions.iter().enumerate() {
            self.ledger.push(SchemaStateRecord {
                version: Version::new(*v),
                name: format!("unit_{v}"),
                checksum: None,
                applied_at: Utc
                    .with_ymd_and_hms(2024, 1, 1, 0, 0, i as u32)
                    .unwrap(),
                reconciled: false,
            });
        }
        self
    }

    fn ledger_versions(&self) -> Vec<u32> {
        self.ledger.iter().map(|r| r.version.get()).collect()
    }

    fn executed_matching(&self, pattern: &str) -> usize {
        self.executed.iter().filter(|s| s.contains(pattern)).count()
    }
}

impl Connection for ScriptedConnection {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.executed.push(sql.to_string());
        match sql {
            "BEGIN" => {
                self.in_transaction = true;
                return Ok(());
            }
            "COMMIT" => {
                self.in_transaction = false;
                self.ledger.append(&mut self.staged);
                return Ok(());
            }
            "ROLLBACK" => {
                self.in_transaction = false;
                self.staged.clear();
                return Ok(());
            }
            _ => {}
        }
        if let Some((pattern, class)) = self.failures.iter().find(|(p, _)| sql.contains(p.as_str()))
        {
            return Err(DbError::execution(*class, format!("scripted failure on {pattern}")));
        }
        if sql.starts_with("CREATE TABLE IF NOT EXISTS \"schema_migrations\"") {
            self.ledger_created = true;
        }
        Ok(())
    }

    fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        self.executed.push(sql.to_string());
        if self.fail_ledger_insert {
            return Err(DbError::execution(ErrorClass::Other, "disk I/O error"));
        }
        let record = SchemaStateRecord {
            version: Version::try_from(params[0].as_i64().unwrap()).unwrap(),
            name: params[1].as_str().unwrap().to_string(),
            checksum: params[2].as_str().map(str::to_string),
            applied_at: params[3].as_timestamp().unwrap(),
            reconciled: params[4].as_bool().unwrap(),
        };
        if self.in_transaction {
            self.staged.push(record);
        } else {
            self.ledger.push(record);
        }
        Ok(1)
    }

    fn query(&mut self, _sql: &str, _params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        let mut rows = self.ledger.clone();
        rows.sort_by_key(|r| r.version);
        Ok(rows
            .into_iter()
            .map(|r| {
                vec![
                    SqlValue::Integer(r.version.as_i64()),
                    SqlValue::Text(r.name),
                    r.checksum.map(SqlValue::Text).unwrap_or(SqlValue::Null),
                    SqlValue::Timestamp(r.applied_at),
                    SqlValue::Bool(r.reconciled),
                ]
            })
            .collect())
    }

    fn set_timeouts(&mut self, statement: Option<Duration>, lock: Duration) -> DbResult<()> {
        self.timeouts = Some((statement, lock));
        Ok(())
    }

    fn supports_transactional_ddl(&self) -> bool {
        self.transactional
    }

    fn acquire_migration_lock(&mut self, _key: &str) -> DbResult<()> {
        if self.fail_lock {
            return Err(DbError::LockUnavailable("held by another runner".into()));
        }
        self.lock_events.push("lock");
        Ok(())
    }

    fn release_migration_lock(&mut self, _key: &str) -> DbResult<()> {
        self.lock_events.push("unlock");
        Ok(())
    }

    fn relation_exists(&mut self, _name: &str) -> DbResult<bool> {
        Ok(self.ledger_created)
    }
}

fn raw_unit(version: u32, statements: &[&str]) -> MigrationUnit {
    statements
        .iter()
        .fold(MigrationUnit::new(version, format!("unit_{version}")), |unit, sql| {
            unit.raw(*sql)
        })
}

fn repo(dialect: Dialect, units: Vec<MigrationUnit>) -> MigrationRepository {
    MigrationRepository::load(units, dialect).unwrap()
}

fn runner(dialect: Dialect) -> MigrationRunner {
    MigrationRunner::new(Config::for_dialect(dialect))
}

fn three_units() -> Vec<MigrationUnit> {
    vec![
        raw_unit(1, &["CREATE TABLE one (id INTEGER)"]),
        raw_unit(2, &["CREATE TABLE two (id INTEGER)"]),
        raw_unit(3, &["CREATE TABLE three (id INTEGER)"]),
    ]
}

#[test]
fn test_fresh_run_applies_everything_in_order() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite);
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();

    assert_eq!(
        report.applied_versions,
        vec![Version::new(1), Version::new(2), Version::new(3)]
    );
    assert!(report.skipped_versions.is_empty());
    assert_eq!(conn.ledger_versions(), vec![1, 2, 3]);
    assert!(conn
        .ledger
        .windows(2)
        .all(|w| w[0].applied_at <= w[1].applied_at));
    assert!(conn.ledger.iter().all(|r| r.checksum.is_some()));
    assert_eq!(conn.lock_events, vec!["lock", "unlock"]);
    assert_eq!(
        conn.timeouts,
        Some((Some(Duration::from_secs(60)), Duration::from_secs(10)))
    );

    let one = conn.executed.iter().position(|s| s.contains("one")).unwrap();
    let three = conn.executed.iter().position(|s| s.contains("three")).unwrap();
    assert!(one < three);
}

#[test]
fn test_second_run_is_a_noop() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite);
    let repo = repo(Dialect::Sqlite, three_units());
    runner(Dialect::Sqlite).run(&mut conn, &repo).unwrap();
    let executed = conn.executed.len();

    let report = runner(Dialect::Sqlite).run(&mut conn, &repo).unwrap();
    assert!(report.applied_versions.is_empty());
    assert_eq!(report.skipped_versions.len(), 3);
    assert!(report.checksum_drift.is_empty());
    // Only the ledger guard runs again.
    assert_eq!(conn.executed.len(), executed + 1);
}

#[test]
fn test_applies_only_missing_versions() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).with_applied(&[1, 2]);
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();

    assert_eq!(report.applied_versions, vec![Version::new(3)]);
    assert_eq!(
        report.skipped_versions,
        BTreeSet::from([Version::new(1), Version::new(2)])
    );
    assert_eq!(conn.executed_matching("TABLE one"), 0);
    assert_eq!(conn.executed_matching("TABLE three"), 1);
    assert_eq!(conn.ledger_versions(), vec![1, 2, 3]);
    // New rows never predate existing ones.
    assert!(conn.ledger[2].applied_at >= conn.ledger[1].applied_at);
}

#[test]
fn test_mid_unit_failure_is_partial_application() {
    let mut conn =
        ScriptedConnection::new(Dialect::Sqlite).fail_on("stmt_two", ErrorClass::Other);
    let units = vec![raw_unit(
        1,
        &[
            "CREATE TABLE stmt_one (id INTEGER)",
            "CREATE TABLE stmt_two (id INTEGER)",
            "CREATE TABLE stmt_three (id INTEGER)",
        ],
    )];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    match &failure.error {
        MigrateError::PartialApplication {
            version,
            statement_index,
            applied_statements,
            ..
        } => {
            assert_eq!(*version, Version::new(1));
            assert_eq!(*statement_index, 2);
            assert_eq!(*applied_statements, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.state, RunState::Applying(Version::new(1)));
    assert!(failure.report.applied_versions.is_empty());
    assert!(conn.ledger.is_empty());
    assert_eq!(conn.executed_matching("stmt_three"), 0);
    assert_eq!(conn.lock_events, vec!["lock", "unlock"]);
}

#[test]
fn test_failure_reports_operation_index_after_skipped_raw() {
    let mut conn =
        ScriptedConnection::new(Dialect::Sqlite).fail_on("missing_table", ErrorClass::Other);
    let units = vec![MigrationUnit::new(1, "mixed")
        .op(LogicalOperation::raw_for(
            Dialect::Postgres,
            "CREATE EXTENSION IF NOT EXISTS pgcrypto",
        ))
        .raw("CREATE TABLE a (id INTEGER)")
        .raw("INSERT INTO missing_table (id) VALUES (1)")];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    match &failure.error {
        MigrateError::PartialApplication {
            statement_index,
            applied_statements,
            ..
        } => {
            assert_eq!(*statement_index, 3);
            assert_eq!(*applied_statements, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(conn.executed_matching("pgcrypto"), 0);
}

#[test]
fn test_reconciled_statement_reports_operation_index() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite)
        .fail_on("ADD COLUMN slug", ErrorClass::DuplicateColumn);
    let units = vec![MigrationUnit::new(1, "blog_slug")
        .mode(IdempotencyMode::BestEffort)
        .op(LogicalOperation::raw_for(
            Dialect::Postgres,
            "SET LOCAL lock_timeout = '1s'",
        ))
        .raw("ALTER TABLE blogs ADD COLUMN slug TEXT")];
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap();
    assert_eq!(report.reconciled.len(), 1);
    assert_eq!(report.reconciled[0].statement_index, 2);
}

#[test]
fn test_unit_rendering_nothing_is_rejected() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite);
    let units = vec![
        raw_unit(1, &["CREATE TABLE one (id INTEGER)"]),
        MigrationUnit::new(2, "postgres_extensions").op(LogicalOperation::raw_for(
            Dialect::Postgres,
            "CREATE EXTENSION IF NOT EXISTS pgcrypto",
        )),
    ];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    assert!(matches!(
        &failure.error,
        MigrateError::Load(LoadError::EmptyUnit { version, .. }) if *version == Version::new(2)
    ));
    // Planning fails before anything runs or is recorded.
    assert!(failure.report.applied_versions.is_empty());
    assert!(conn.ledger.is_empty());
    assert_eq!(conn.executed_matching("TABLE one"), 0);
}

#[test]
fn test_failure_aborts_later_units() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).fail_on("two", ErrorClass::Other);
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrateError::StatementFailed {
            statement_index: 1,
            ..
        }
    ));
    assert_eq!(failure.error.version(), Some(Version::new(2)));
    assert_eq!(failure.report.applied_versions, vec![Version::new(1)]);
    assert_eq!(conn.ledger_versions(), vec![1]);
    assert_eq!(conn.executed_matching("three"), 0);
}

#[test]
fn test_timeout_is_fatal_and_not_retried() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).fail_on("slow", ErrorClass::Timeout);
    let units = vec![raw_unit(1, &["CREATE TABLE slow AS SELECT 1 AS x"])];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    assert!(matches!(failure.error, MigrateError::Timeout { .. }));
    assert_eq!(conn.executed_matching("slow"), 1);
    assert!(conn.ledger.is_empty());
}

#[test]
fn test_ledger_write_failure_after_ddl() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite);
    conn.fail_ledger_insert = true;
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrateError::LedgerWrite { version, .. } if version == Version::new(1)
    ));
    assert_eq!(failure.state, RunState::Recording(Version::new(1)));
    assert_eq!(conn.executed_matching("TABLE one"), 1);
    assert_eq!(conn.executed_matching("TABLE two"), 0);
}

#[test]
fn test_ledger_failure_rolls_back_atomic_unit() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).transactional();
    conn.fail_ledger_insert = true;
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap_err();

    assert!(matches!(failure.error, MigrateError::Ledger(_)));
    assert_eq!(conn.executed.last().map(String::as_str), Some("ROLLBACK"));
    assert!(conn.ledger.is_empty());
}

#[test]
fn test_atomic_failure_rolls_back_instead_of_partial() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite)
        .transactional()
        .fail_on("stmt_two", ErrorClass::Other);
    let units = vec![raw_unit(
        1,
        &[
            "CREATE TABLE stmt_one (id INTEGER)",
            "CREATE TABLE stmt_two (id INTEGER)",
        ],
    )];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrateError::StatementFailed {
            statement_index: 2,
            ..
        }
    ));
    assert_eq!(conn.executed_matching("ROLLBACK"), 1);
    assert_eq!(conn.executed_matching("COMMIT"), 0);
    assert!(conn.ledger.is_empty());
}

#[test]
fn test_atomic_unit_commits_with_ledger_row() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).transactional();
    runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();
    assert_eq!(conn.executed_matching("BEGIN"), 3);
    assert_eq!(conn.executed_matching("COMMIT"), 3);
    assert_eq!(conn.ledger_versions(), vec![1, 2, 3]);
}

#[test]
fn test_transactional_disabled_by_config() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).transactional();
    let config = Config {
        transactional: false,
        ..Config::for_dialect(Dialect::Sqlite)
    };
    MigrationRunner::new(config)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();
    assert_eq!(conn.executed_matching("BEGIN"), 0);
}

#[test]
fn test_split_block_is_rejected_before_any_statement() {
    let mut conn = ScriptedConnection::new(Dialect::Postgres);
    let units = vec![
        raw_unit(1, &["CREATE TABLE blogs (id SERIAL PRIMARY KEY)"]),
        raw_unit(
            2,
            &[
                "DO $$ BEGIN IF NOT EXISTS (SELECT 1 FROM information_schema.columns \
                 WHERE table_name = 'blogs' AND column_name = 'slug') THEN \
                 ALTER TABLE blogs ADD COLUMN slug VARCHAR(255);",
                "END IF;",
                "END $$;",
            ],
        ),
    ];
    let failure = runner(Dialect::Postgres)
        .run(&mut conn, &repo(Dialect::Postgres, units))
        .unwrap_err();

    match &failure.error {
        MigrateError::Render {
            version,
            statement_index,
            dialect,
            ..
        } => {
            assert_eq!(*version, Version::new(2));
            assert_eq!(*statement_index, 1);
            assert_eq!(*dialect, Dialect::Postgres);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.state, RunState::Planning);
    assert!(conn.executed.is_empty(), "executed: {:?}", conn.executed);
    assert!(!conn.ledger_created);
}

#[test]
fn test_best_effort_duplicate_is_reconciled() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite)
        .fail_on("ADD COLUMN slug", ErrorClass::DuplicateColumn);
    let units = vec![MigrationUnit::new(1, "legacy_slug")
        .mode(IdempotencyMode::BestEffort)
        .raw("ALTER TABLE blogs ADD COLUMN slug TEXT")
        .raw("ALTER TABLE blogs ADD COLUMN summary TEXT")];
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap();

    assert_eq!(report.applied_versions, vec![Version::new(1)]);
    assert_eq!(
        report.reconciled,
        vec![ReconciledStatement {
            version: Version::new(1),
            statement_index: 1,
            class: "duplicate_column".into(),
        }]
    );
    assert!(conn.ledger[0].reconciled);
    assert_eq!(conn.executed_matching("summary"), 1);
}

#[test]
fn test_reconciled_statement_uses_savepoint_in_transaction() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite)
        .transactional()
        .fail_on("\"slug\"", ErrorClass::DuplicateColumn);
    let units = vec![MigrationUnit::new(7, "add_blog_slug").add_column(ColumnDescriptor::new(
        "blogs",
        "slug",
        ColumnType::Text,
    ))];
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap();

    assert_eq!(report.reconciled.len(), 1);
    let tail: Vec<&str> = conn
        .executed
        .iter()
        .skip_while(|s| *s != "BEGIN")
        .map(String::as_str)
        .collect();
    assert_eq!(tail[0], "BEGIN");
    assert_eq!(tail[1], "SAVEPOINT \"tm_stmt\"");
    assert!(tail[2].contains("ADD COLUMN \"slug\""));
    assert_eq!(tail[3], "ROLLBACK TO SAVEPOINT \"tm_stmt\"");
    assert_eq!(tail[4], "RELEASE SAVEPOINT \"tm_stmt\"");
    assert_eq!(tail.last(), Some(&"COMMIT"));
    assert_eq!(conn.ledger_versions(), vec![7]);
}

#[test]
fn test_rolled_back_unit_drops_its_reconciliations() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite)
        .transactional()
        .fail_on("ADD COLUMN slug", ErrorClass::DuplicateColumn)
        .fail_on("ADD COLUMN summary", ErrorClass::Other);
    let units = vec![MigrationUnit::new(1, "legacy_slug")
        .mode(IdempotencyMode::BestEffort)
        .raw("ALTER TABLE blogs ADD COLUMN slug TEXT")
        .raw("ALTER TABLE blogs ADD COLUMN summary TEXT")];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrateError::StatementFailed {
            statement_index: 2,
            ..
        }
    ));
    assert!(failure.report.reconciled.is_empty());
    assert!(conn.ledger.is_empty());
}

#[test]
fn test_unguarded_duplicate_is_fatal() {
    let mut conn =
        ScriptedConnection::new(Dialect::Sqlite).fail_on("blogs", ErrorClass::DuplicateColumn);
    let units = vec![MigrationUnit::new(1, "backfill")
        .mode(IdempotencyMode::Unguarded)
        .raw("ALTER TABLE blogs ADD COLUMN slug TEXT")];
    let failure = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, units))
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrateError::AlreadyExists {
            mode: IdempotencyMode::Unguarded,
            statement_index: 1,
            ..
        }
    ));
    assert!(failure.report.reconciled.is_empty());
    assert!(conn.ledger.is_empty());
}

#[test]
fn test_native_guard_duplicate_is_fatal() {
    let mut conn =
        ScriptedConnection::new(Dialect::Postgres).fail_on("roles", ErrorClass::DuplicateRelation);
    let units = vec![MigrationUnit::new(1, "create_roles").raw("CREATE TABLE roles (id INTEGER)")];
    let failure = runner(Dialect::Postgres)
        .run(&mut conn, &repo(Dialect::Postgres, units))
        .unwrap_err();
    assert!(matches!(
        failure.error,
        MigrateError::AlreadyExists {
            mode: IdempotencyMode::NativeGuarded,
            ..
        }
    ));
}

#[test]
fn test_dialect_mismatch() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite);
    let failure = runner(Dialect::Postgres)
        .run(&mut conn, &repo(Dialect::Postgres, three_units()))
        .unwrap_err();
    assert!(matches!(failure.error, MigrateError::DialectMismatch { .. }));
    assert_eq!(failure.state, RunState::Loading);
    assert!(conn.lock_events.is_empty());
    assert!(conn.executed.is_empty());
}

#[test]
fn test_lock_unavailable() {
    let mut conn = ScriptedConnection::new(Dialect::Postgres);
    conn.fail_lock = true;
    let failure = runner(Dialect::Postgres)
        .run(&mut conn, &repo(Dialect::Postgres, three_units()))
        .unwrap_err();
    assert!(matches!(failure.error, MigrateError::Lock(_)));
    assert!(conn.executed.is_empty());
}

#[test]
fn test_checksum_drift_is_reported_not_rerun() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).with_applied(&[1]);
    conn.ledger[0].checksum = Some("0".repeat(64));
    let report = runner(Dialect::Sqlite)
        .run(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();
    assert_eq!(report.checksum_drift, vec![Version::new(1)]);
    assert_eq!(conn.executed_matching("TABLE one"), 0);
}

#[test]
fn test_plan_lists_pending_without_executing() {
    let mut conn = ScriptedConnection::new(Dialect::Sqlite).with_applied(&[1]);
    let plans = runner(Dialect::Sqlite)
        .plan(&mut conn, &repo(Dialect::Sqlite, three_units()))
        .unwrap();
    let versions: Vec<u32> = plans.iter().map(|p| p.version.get()).collect();
    assert_eq!(versions, vec![2, 3]);
    assert_eq!(plans[0].statements[0].sql, "CREATE TABLE two (id INTEGER)");
    assert!(conn.executed.is_empty());
}

#[test]
fn test_plan_unit_checksum_tracks_rendering() {
    let unit = raw_unit(1, &["CREATE TABLE one (id INTEGER);"]);
    let sqlite = plan_unit(&unit, dialect_for(Dialect::Sqlite).as_ref()).unwrap();
    let trimmed = plan_unit(
        &raw_unit(1, &["CREATE TABLE one (id INTEGER)"]),
        dialect_for(Dialect::Sqlite).as_ref(),
    )
    .unwrap();
    assert_eq!(sqlite.checksum, trimmed.checksum);
    assert_eq!(sqlite.checksum.len(), 64);

    let changed = plan_unit(
        &raw_unit(1, &["CREATE TABLE one (id BIGINT)"]),
        dialect_for(Dialect::Sqlite).as_ref(),
    )
    .unwrap();
    assert_ne!(sqlite.checksum, changed.checksum);
}

#[test]
fn test_plan_unit_tags_statements_with_operation() {
    let unit = MigrationUnit::new(1, "mixed")
        .op(LogicalOperation::raw_for(Dialect::Postgres, "SELECT pg_sleep(0)"))
        .raw("CREATE TABLE a (id INTEGER)")
        .raw("CREATE TABLE b (id INTEGER)");
    let plan = plan_unit(&unit, dialect_for(Dialect::Sqlite).as_ref()).unwrap();
    let indexes: Vec<usize> = plan.statements.iter().map(|s| s.operation_index).collect();
    assert_eq!(indexes, vec![2, 3]);

    let empty = MigrationUnit::new(2, "pg_only")
        .op(LogicalOperation::raw_for(Dialect::Postgres, "SELECT 1"));
    let err = plan_unit(&empty, dialect_for(Dialect::Sqlite).as_ref()).unwrap_err();
    assert!(err.to_string().contains("[L003]"));
    assert!(plan_unit(&empty, dialect_for(Dialect::Postgres).as_ref()).is_ok());
}

#[test]
fn test_run_failure_display_names_state() {
    let failure = RunFailure {
        error: MigrateError::Lock(DbError::LockUnavailable("busy".into())),
        report: MigrationReport::default(),
        state: RunState::Applying(Version::new(4)),
    };
    let text = failure.to_string();
    assert!(text.contains("applying(v004)"));
    assert!(text.contains("[M009]"));
}
