//! `SQLite` driver adapter over `rusqlite`.
//!
//! Blocking calls run under `tokio::task::spawn_blocking` with the
//! connection behind a mutex; there is deliberately no pooling here.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, ToSql};

use crate::driver::{Driver, ExecOutcome};
use crate::error::SqlRunnerError;
use crate::results::ResultSet;
use crate::value::SqlValue;

/// A [`Driver`] backed by a single `rusqlite` connection.
pub struct SqliteDriver {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDriver {
    /// Open a file-backed database.
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error if the database can't be
    /// opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqlRunnerError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open(path)?)),
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error on failure.
    pub fn open_in_memory() -> Result<Self, SqlRunnerError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    /// Run bootstrap SQL (DDL, seed data) outside the engine. Multiple
    /// statements are allowed; no parameters.
    ///
    /// # Errors
    ///
    /// Returns the underlying `rusqlite` error on failure.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlRunnerError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        run_blocking(move || {
            let guard = lock(&conn)?;
            guard.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver").finish_non_exhaustive()
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, SqlRunnerError> {
    conn.lock()
        .map_err(|_| SqlRunnerError::Driver("sqlite connection mutex poisoned".to_string()))
}

async fn run_blocking<T, F>(f: F) -> Result<T, SqlRunnerError>
where
    F: FnOnce() -> Result<T, SqlRunnerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SqlRunnerError::Driver(format!("sqlite task join: {e}")))?
}

/// Convert a bound value to a `rusqlite` value. Timestamps become
/// `%F %T%.f` text, booleans integers, JSON its text form.
#[must_use]
pub fn sql_value_to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Json(j) => Value::Text(j.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn sqlite_value_to_sql(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

/// Drain a prepared statement into a [`ResultSet`], column names captured
/// once and shared by every row.
///
/// # Errors
///
/// Returns the underlying `rusqlite` error if the query or a value read
/// fails.
pub fn build_result_set(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[Value],
) -> Result<ResultSet, SqlRunnerError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    let mut rows_iter = stmt.query(&param_refs[..])?;
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: Value = row.get(i)?;
            values.push(sqlite_value_to_sql(value));
        }
        result_set.add_row_values(values)?;
    }

    Ok(result_set)
}

#[async_trait]
impl Driver for SqliteDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome, SqlRunnerError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(sql_value_to_sqlite).collect();
        run_blocking(move || {
            let guard = lock(&conn)?;
            let mut stmt = guard.prepare(&sql)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
            let rows_affected = stmt.execute(&param_refs[..])?;
            drop(stmt);
            Ok(ExecOutcome {
                rows_affected: rows_affected as u64,
                last_insert_id: Some(guard.last_insert_rowid()),
            })
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, SqlRunnerError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(sql_value_to_sqlite).collect();
        run_blocking(move || {
            let guard = lock(&conn)?;
            let mut stmt = guard.prepare(&sql)?;
            build_result_set(&mut stmt, &params)
        })
        .await
    }
}
