//! PostgreSQL database backend implementation

use crate::error::{DbError, DbResult, ErrorClass};
use crate::traits::Connection;
use crate::value::SqlValue;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres::error::SqlState;
use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls, Row};
use std::time::Duration;
use tm_core::Dialect;

/// PostgreSQL database backend
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connect using a libpq-style URL or key/value string
    pub fn connect(url: &str) -> DbResult<Self> {
        let client = Client::connect(url, NoTls).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Connection for PostgresBackend {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.client.batch_execute(sql).map_err(classify)
    }

    fn execute_with(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let boxed = to_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|p| p.as_ref()).collect();
        let affected = self.client.execute(sql, &refs).map_err(classify)?;
        Ok(affected as usize)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Vec<SqlValue>>> {
        let boxed = to_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|p| p.as_ref()).collect();
        let rows = self.client.query(sql, &refs).map_err(classify)?;
        rows.iter().map(from_row).collect()
    }

    fn set_timeouts(&mut self, statement: Option<Duration>, lock: Duration) -> DbResult<()> {
        let statement_ms = statement.map_or(0, |d| d.as_millis());
        self.execute(&format!(
            "SET statement_timeout = {statement_ms}; SET lock_timeout = {}",
            lock.as_millis()
        ))
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn acquire_migration_lock(&mut self, key: &str) -> DbResult<()> {
        // Session-level advisory lock; waiting is bounded by lock_timeout.
        self.client
            .execute("SELECT pg_advisory_lock(hashtext($1))", &[&key])
            .map_err(classify)?;
        Ok(())
    }

    fn release_migration_lock(&mut self, key: &str) -> DbResult<()> {
        self.client
            .execute("SELECT pg_advisory_unlock(hashtext($1))", &[&key])
            .map_err(classify)?;
        Ok(())
    }

    fn relation_exists(&mut self, name: &str) -> DbResult<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1)",
                &[&name],
            )
            .map_err(classify)?;
        row.try_get(0).map_err(|e| DbError::Conversion {
            column: 0,
            message: e.to_string(),
        })
    }
}

fn to_params(params: &[SqlValue]) -> Vec<Box<dyn ToSql + Sync>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync> {
            match value {
                // Untyped NULL binds as a text-typed NULL.
                SqlValue::Null => Box::new(None::<String>),
                SqlValue::Integer(i) => Box::new(*i),
                SqlValue::Real(f) => Box::new(*f),
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Bool(b) => Box::new(*b),
                SqlValue::Timestamp(ts) => Box::new(*ts),
            }
        })
        .collect()
}

fn from_row(row: &Row) -> DbResult<Vec<SqlValue>> {
    (0..row.len()).map(|i| column_value(row, i)).collect()
}

fn column_value(row: &Row, idx: usize) -> DbResult<SqlValue> {
    let conversion = |e: postgres::Error| DbError::Conversion {
        column: idx,
        message: e.to_string(),
    };
    let ty = row.columns()[idx].type_().clone();

    let value = if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(conversion)?
            .map(|v| SqlValue::Integer(i64::from(v)))
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(conversion)?
            .map(|v| SqlValue::Integer(i64::from(v)))
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)
            .map_err(conversion)?
            .map(SqlValue::Integer)
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(conversion)?
            .map(|v| SqlValue::Real(f64::from(v)))
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .map_err(conversion)?
            .map(SqlValue::Real)
    } else if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)
            .map_err(conversion)?
            .map(SqlValue::Bool)
    } else if ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(conversion)?
            .map(SqlValue::Timestamp)
    } else if ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(conversion)?
            .map(|v| SqlValue::Timestamp(v.and_utc()))
    } else {
        row.try_get::<_, Option<String>>(idx)
            .map_err(conversion)?
            .map(SqlValue::Text)
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

/// Classify a PostgreSQL error by SQLSTATE
fn classify(err: postgres::Error) -> DbError {
    let class = if err.is_closed() {
        ErrorClass::Connection
    } else {
        match err.code() {
            Some(code) if *code == SqlState::DUPLICATE_COLUMN => ErrorClass::DuplicateColumn,
            Some(code) if *code == SqlState::DUPLICATE_TABLE => ErrorClass::DuplicateRelation,
            Some(code) if *code == SqlState::DUPLICATE_OBJECT => ErrorClass::DuplicateObject,
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => ErrorClass::UniqueViolation,
            Some(code) if *code == SqlState::QUERY_CANCELED => ErrorClass::Timeout,
            Some(code) if *code == SqlState::LOCK_NOT_AVAILABLE => ErrorClass::LockUnavailable,
            _ => ErrorClass::Other,
        }
    };
    let message = match err.as_db_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    };
    DbError::execution(class, message)
}
