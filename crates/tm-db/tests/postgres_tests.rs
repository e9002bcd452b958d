//! PostgreSQL backend tests.
//!
//! These need a reachable server and run only when
//! `TIDEMARK_TEST_POSTGRES_URL` is set; otherwise each test returns early.

use std::time::Duration;

use tm_db::{Connection, ErrorClass, PostgresBackend, SqlValue};

fn connect() -> Option<PostgresBackend> {
    let url = std::env::var("TIDEMARK_TEST_POSTGRES_URL").ok()?;
    Some(PostgresBackend::connect(&url).expect("connect to test database"))
}

#[test]
fn test_duplicate_column_classified() {
    let Some(mut db) = connect() else { return };
    db.execute("DROP TABLE IF EXISTS tm_db_dup_col").unwrap();
    db.execute("CREATE TABLE tm_db_dup_col (id SERIAL PRIMARY KEY, note TEXT)")
        .unwrap();
    let err = db
        .execute("ALTER TABLE tm_db_dup_col ADD COLUMN note TEXT")
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::DuplicateColumn);
    db.execute("DROP TABLE tm_db_dup_col").unwrap();
}

#[test]
fn test_query_types() {
    let Some(mut db) = connect() else { return };
    let rows = db
        .query(
            "SELECT $1::BIGINT, 'x'::TEXT, TRUE, now(), NULL::TEXT",
            &[SqlValue::Integer(7)],
        )
        .unwrap();
    assert_eq!(rows[0][0].as_i64(), Some(7));
    assert_eq!(rows[0][1].as_str(), Some("x"));
    assert_eq!(rows[0][2].as_bool(), Some(true));
    assert!(rows[0][3].as_timestamp().is_some());
    assert!(rows[0][4].is_null());
}

#[test]
fn test_statement_timeout() {
    let Some(mut db) = connect() else { return };
    db.set_timeouts(Some(Duration::from_millis(100)), Duration::from_secs(1))
        .unwrap();
    let err = db.execute("SELECT pg_sleep(2)").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Timeout);
}

#[test]
fn test_advisory_lock_round_trip() {
    let Some(mut db) = connect() else { return };
    db.acquire_migration_lock("tm_db_lock_test").unwrap();
    db.release_migration_lock("tm_db_lock_test").unwrap();
}

#[test]
fn test_transactional_ddl_rolls_back() {
    let Some(mut db) = connect() else { return };
    db.execute("DROP TABLE IF EXISTS tm_db_tx").unwrap();
    db.begin().unwrap();
    db.execute("CREATE TABLE tm_db_tx (id INTEGER)").unwrap();
    db.rollback().unwrap();
    assert!(!db.relation_exists("tm_db_tx").unwrap());
}
