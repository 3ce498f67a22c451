#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sql_runner::prelude::*;

/// Scripted driver: records every call, optionally sleeps or fails, and
/// hands back queued result sets (empty set when the queue is dry).
#[derive(Default)]
pub struct FakeDriver {
    pub exec_calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
    pub query_calls: Mutex<Vec<(String, Vec<SqlValue>)>>,
    responses: Mutex<VecDeque<ResultSet>>,
    delay: Option<Duration>,
    fail_message: Option<String>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_message = Some(message.to_string());
        self
    }

    pub fn push_rows(&self, rows: ResultSet) {
        self.responses.lock().unwrap().push_back(rows);
    }

    pub fn exec_count(&self) -> usize {
        self.exec_calls.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.query_calls.lock().unwrap().len()
    }

    pub fn exec_sql(&self) -> Vec<String> {
        self.exec_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn query_sql(&self) -> Vec<String> {
        self.query_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome, SqlRunnerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.exec_calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if let Some(message) = &self.fail_message {
            return Err(SqlRunnerError::Driver(message.clone()));
        }
        Ok(ExecOutcome {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, SqlRunnerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.query_calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        if let Some(message) = &self.fail_message {
            return Err(SqlRunnerError::Driver(message.clone()));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

pub fn result_set(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|s| s.to_string()).collect()));
    for row in rows {
        rs.add_row_values(row).unwrap();
    }
    rs
}

/// In-memory cache with TTL, plus hooks for planting corrupt entries.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn put_raw(&self, key: &str, bytes: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), None));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl QueryCache for MemoryCache {
    async fn set(&self, key: &str, bytes: &[u8], ttl_seconds: u64) -> Result<(), SqlRunnerError> {
        let expires =
            (ttl_seconds > 0).then(|| Instant::now() + Duration::from_secs(ttl_seconds));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), expires));
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, SqlRunnerError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((bytes, expires)) => {
                if expires.is_some_and(|at| Instant::now() >= at) {
                    entries.remove(key);
                    Ok(None)
                } else {
                    Ok(Some(bytes.clone()))
                }
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), SqlRunnerError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Every operation fails; used to prove the cache is never a correctness
/// dependency.
#[derive(Default)]
pub struct FailingCache {
    pub delete_calls: Mutex<usize>,
}

#[async_trait]
impl QueryCache for FailingCache {
    async fn set(&self, _key: &str, _bytes: &[u8], _ttl: u64) -> Result<(), SqlRunnerError> {
        Err(SqlRunnerError::Cache("set refused".to_string()))
    }

    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>, SqlRunnerError> {
        Err(SqlRunnerError::Cache("get refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), SqlRunnerError> {
        *self.delete_calls.lock().unwrap() += 1;
        Err(SqlRunnerError::Cache("delete refused".to_string()))
    }
}

/// Cache whose every operation sleeps, for deadline tests.
pub struct SlowCache {
    pub inner: MemoryCache,
    pub delay: Duration,
}

#[async_trait]
impl QueryCache for SlowCache {
    async fn set(&self, key: &str, bytes: &[u8], ttl: u64) -> Result<(), SqlRunnerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, bytes, ttl).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, SqlRunnerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_bytes(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), SqlRunnerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete(key).await
    }
}

/// Records which events fired, by name.
#[derive(Default)]
pub struct RecordingSink {
    pub errors: Mutex<Vec<String>>,
    pub timings: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn error_names(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn timing_names(&self) -> Vec<String> {
        self.timings.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn error(&self, name: &str, _err: &SqlRunnerError) {
        self.errors.lock().unwrap().push(name.to_string());
    }

    fn error_with_fields(&self, name: &str, err: &SqlRunnerError, _fields: &[(&str, &str)]) {
        self.error(name, err);
    }

    fn timing(&self, name: &str, _nanoseconds: u64) {
        self.timings.lock().unwrap().push(name.to_string());
    }

    fn timing_with_fields(&self, name: &str, nanoseconds: u64, _fields: &[(&str, &str)]) {
        self.timing(name, nanoseconds);
    }
}

/// Sink with the tracing capability, recording span transitions in order.
#[derive(Default)]
pub struct TracingRecordingSink {
    pub spans: Mutex<Vec<String>>,
}

impl EventSink for TracingRecordingSink {}

impl TracingEventSink for TracingRecordingSink {
    fn span_start(&self, event_name: &str, _sql: &str) {
        self.spans.lock().unwrap().push(format!("start:{event_name}"));
    }

    fn span_error(&self, _err: &SqlRunnerError) {
        self.spans.lock().unwrap().push("error".to_string());
    }

    fn span_finish(&self) {
        self.spans.lock().unwrap().push("finish".to_string());
    }
}

/// Decodes from rows fine but refuses serde encoding, to exercise the
/// cache-store suppression path.
#[derive(Debug, Clone, PartialEq)]
pub struct Unencodable {
    pub id: i64,
}

impl FromRow for Unencodable {
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
        Ok(Unencodable {
            id: *row
                .get("id")
                .and_then(SqlValue::as_int)
                .ok_or_else(|| SqlRunnerError::Decode("unencodable.id".to_string()))?,
        })
    }
}

impl serde::Serialize for Unencodable {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("refuses to encode"))
    }
}

impl<'de> serde::Deserialize<'de> for Unencodable {
    fn deserialize<D: serde::Deserializer<'de>>(_deserializer: D) -> Result<Self, D::Error> {
        Err(serde::de::Error::custom("refuses to decode"))
    }
}

/// The row shape most tests load into.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
}

impl FromRow for Person {
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
        Ok(Person {
            id: *row
                .get("id")
                .and_then(SqlValue::as_int)
                .ok_or_else(|| SqlRunnerError::Decode("person.id".to_string()))?,
            name: row
                .get("name")
                .and_then(SqlValue::as_text)
                .ok_or_else(|| SqlRunnerError::Decode("person.name".to_string()))?
                .to_string(),
        })
    }
}
