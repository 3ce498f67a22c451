use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{CacheDirective, decode_entry, encode_entry};
use crate::dialect::Dialect;
use crate::driver::{Driver, ExecOutcome};
use crate::error::SqlRunnerError;
use crate::event::{EventSink, TracingEventSink};
use crate::interpolate::interpolate;
use crate::results::{FromRow, ResultSet};
use crate::statement::{Build, RenderedQuery};
use crate::value::SqlValue;

/// One call's view of the session: capabilities resolved, no shared state.
pub(crate) struct Engine<'a> {
    pub driver: &'a dyn Driver,
    pub dialect: &'a dyn Dialect,
    pub sink: &'a dyn EventSink,
    pub tracer: Option<&'a dyn TracingEventSink>,
    pub timeout: Option<Duration>,
}

impl Engine<'_> {
    fn render(&self, stmt: &dyn Build, event: &str) -> Result<RenderedQuery, SqlRunnerError> {
        match interpolate(stmt, self.dialect) {
            Ok(rendered) => Ok(rendered),
            Err(err) => {
                self.sink.error(event, &err);
                Err(err)
            }
        }
    }

    fn report(&self, event: &str, err: &SqlRunnerError, sql: &str, started: Instant) {
        let time = started.elapsed().as_millis().to_string();
        self.sink
            .error_with_fields(event, err, &[("sql", sql), ("time", &time)]);
    }

    fn timing(&self, event: &str, started: Instant, sql: &str) {
        let ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.sink.timing_with_fields(event, ns, &[("sql", sql)]);
    }

    /// Bound a driver round trip by the session deadline. Errors come back as
    /// `(message, timed_out)` so the caller can attach SQL text and elapsed
    /// time.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, SqlRunnerError>>,
    ) -> Result<T, (String, bool)> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(res) => res.map_err(|e| (e.to_string(), false)),
                Err(_) => Err(("deadline exceeded".to_string(), true)),
            },
            None => fut.await.map_err(|e| (e.to_string(), false)),
        }
    }

    /// Bound a cache round trip by the same deadline. A slow cache degrades
    /// like a broken one: a non-fatal `Cache` error.
    async fn bounded_cache<T>(
        &self,
        fut: impl Future<Output = Result<T, SqlRunnerError>>,
    ) -> Result<T, SqlRunnerError> {
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(res) => res,
                Err(_) => Err(SqlRunnerError::Cache("deadline exceeded".to_string())),
            },
            None => fut.await,
        }
    }

    fn execution_error(
        &self,
        sql: &str,
        started: Instant,
        message: String,
        timed_out: bool,
    ) -> SqlRunnerError {
        SqlRunnerError::Execution {
            sql: sql.to_string(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timed_out,
            message,
        }
    }
}

/// The mutating path: interpolate, bounded round trip, cache invalidation,
/// timing event.
pub(crate) async fn exec(
    eng: &Engine<'_>,
    stmt: &dyn Build,
    cache: Option<&CacheDirective>,
) -> Result<ExecOutcome, SqlRunnerError> {
    let rendered = eng.render(stmt, "runner.exec.interpolate")?;
    let started = Instant::now();

    if let Some(tracer) = eng.tracer {
        tracer.span_start("runner.exec", &rendered.sql);
    }

    let outcome = match eng
        .bounded(eng.driver.execute(&rendered.sql, &rendered.values))
        .await
    {
        Ok(outcome) => {
            if let Some(tracer) = eng.tracer {
                tracer.span_finish();
            }
            outcome
        }
        Err((message, timed_out)) => {
            let err = eng.execution_error(&rendered.sql, started, message, timed_out);
            if let Some(tracer) = eng.tracer {
                tracer.span_error(&err);
                tracer.span_finish();
            }
            eng.report("runner.exec.exec", &err, &rendered.sql, started);
            return Err(err);
        }
    };

    // Write invalidation. A failed delete never masks a successful write.
    if let Some(directive) = cache {
        if !directive.key.is_empty() {
            if let Err(err) = eng
                .bounded_cache(directive.cache().delete(&directive.key))
                .await
            {
                eng.report("runner.exec.cache.del", &err, &rendered.sql, started);
            }
        }
    }

    eng.timing("runner.exec", started, &rendered.sql);
    Ok(outcome)
}

pub(crate) async fn query_rows<T: FromRow>(
    eng: &Engine<'_>,
    stmt: &dyn Build,
    dest: &mut Vec<T>,
) -> Result<usize, SqlRunnerError> {
    let started = Instant::now();
    let rendered = eng.render(stmt, "runner.select.interpolate")?;
    let loaded = run_select::<T>(eng, &rendered, started).await?;
    let count = loaded.len();
    dest.extend(loaded);
    eng.timing("runner.select", started, &rendered.sql);
    Ok(count)
}

pub(crate) async fn query_rows_cached<T>(
    eng: &Engine<'_>,
    stmt: &dyn Build,
    dest: &mut Vec<T>,
    directive: &CacheDirective,
) -> Result<usize, SqlRunnerError>
where
    T: FromRow + Serialize + DeserializeOwned,
{
    let started = Instant::now();
    let rendered = eng.render(stmt, "runner.select.interpolate")?;
    require_key(eng, directive, &rendered.sql, started)?;

    if let Some(rows) = cache_fetch::<Vec<T>>(eng, directive, &rendered.sql, started).await {
        let count = rows.len();
        dest.extend(rows);
        eng.timing("runner.select.cache", started, &rendered.sql);
        return Ok(count);
    }

    let loaded = run_select::<T>(eng, &rendered, started).await?;
    let count = loaded.len();
    cache_store(eng, directive, &loaded, &rendered.sql, started).await;
    dest.extend(loaded);
    eng.timing("runner.select", started, &rendered.sql);
    Ok(count)
}

pub(crate) async fn query_one<T: FromRow>(
    eng: &Engine<'_>,
    stmt: &dyn Build,
) -> Result<Option<T>, SqlRunnerError> {
    let started = Instant::now();
    let rendered = eng.render(stmt, "runner.select.interpolate")?;
    let found = select_first::<T>(eng, &rendered, started).await?;
    eng.timing("runner.select", started, &rendered.sql);
    Ok(found)
}

pub(crate) async fn query_one_cached<T>(
    eng: &Engine<'_>,
    stmt: &dyn Build,
    directive: &CacheDirective,
) -> Result<Option<T>, SqlRunnerError>
where
    T: FromRow + Serialize + DeserializeOwned,
{
    let started = Instant::now();
    let rendered = eng.render(stmt, "runner.select.interpolate")?;
    require_key(eng, directive, &rendered.sql, started)?;

    // A cached `None` is a valid hit: the query ran before and found nothing.
    if let Some(found) = cache_fetch::<Option<T>>(eng, directive, &rendered.sql, started).await {
        eng.timing("runner.select.cache", started, &rendered.sql);
        return Ok(found);
    }

    let found = select_first::<T>(eng, &rendered, started).await?;
    cache_store(eng, directive, &found, &rendered.sql, started).await;
    eng.timing("runner.select", started, &rendered.sql);
    Ok(found)
}

pub(crate) async fn query_count(
    eng: &Engine<'_>,
    stmt: &dyn Build,
    cache: Option<&CacheDirective>,
) -> Result<i64, SqlRunnerError> {
    let started = Instant::now();
    let rendered = eng.render(stmt, "runner.select.interpolate")?;
    let wrapped = RenderedQuery {
        sql: format!("SELECT COUNT(*) FROM ({}) AS count", rendered.sql),
        values: rendered.values,
    };

    if let Some(directive) = cache {
        require_key(eng, directive, &wrapped.sql, started)?;
        if let Some(count) = cache_fetch::<i64>(eng, directive, &wrapped.sql, started).await {
            eng.timing("runner.select.cache", started, &wrapped.sql);
            return Ok(count);
        }
    }

    let result_set = drive_select(eng, &wrapped, started).await?;
    let count = result_set
        .rows
        .first()
        .and_then(|row| row.get_by_index(0))
        .and_then(SqlValue::as_int)
        .copied()
        .unwrap_or(0);

    if let Some(directive) = cache {
        cache_store(eng, directive, &count, &wrapped.sql, started).await;
    }

    eng.timing("runner.select", started, &wrapped.sql);
    Ok(count)
}

fn require_key(
    eng: &Engine<'_>,
    directive: &CacheDirective,
    sql: &str,
    started: Instant,
) -> Result<(), SqlRunnerError> {
    if directive.key.is_empty() {
        let err = SqlRunnerError::CacheKeyNotSpecified;
        eng.report("runner.select.cache.key", &err, sql, started);
        return Err(err);
    }
    Ok(())
}

/// Attempt a cache read. Backend failures and undecodable entries both
/// degrade to a miss; neither ever surfaces as the call's error.
async fn cache_fetch<T: DeserializeOwned>(
    eng: &Engine<'_>,
    directive: &CacheDirective,
    sql: &str,
    started: Instant,
) -> Option<T> {
    let bytes = match eng
        .bounded_cache(directive.cache().get_bytes(&directive.key))
        .await
    {
        Ok(found) => found?,
        Err(err) => {
            eng.report("runner.select.cache.get", &err, sql, started);
            return None;
        }
    };
    match decode_entry::<T>(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            eng.report("runner.select.cache.decode", &err, sql, started);
            None
        }
    }
}

/// Store a result. Encode failure suppresses the store; set failure is
/// reported and ignored.
async fn cache_store<T: Serialize>(
    eng: &Engine<'_>,
    directive: &CacheDirective,
    value: &T,
    sql: &str,
    started: Instant,
) {
    let bytes = match encode_entry(value) {
        Ok(bytes) => bytes,
        Err(err) => {
            eng.report("runner.select.cache.encode", &err, sql, started);
            return;
        }
    };
    if let Err(err) = eng
        .bounded_cache(
            directive
                .cache()
                .set(&directive.key, &bytes, directive.ttl_seconds),
        )
        .await
    {
        eng.report("runner.select.cache.set", &err, sql, started);
    }
}

async fn run_select<T: FromRow>(
    eng: &Engine<'_>,
    rendered: &RenderedQuery,
    started: Instant,
) -> Result<Vec<T>, SqlRunnerError> {
    let result_set = drive_select(eng, rendered, started).await?;
    let mut loaded = Vec::with_capacity(result_set.len());
    for row in &result_set.rows {
        match T::from_row(row) {
            Ok(value) => loaded.push(value),
            Err(err) => {
                eng.report("runner.select.scan", &err, &rendered.sql, started);
                return Err(err);
            }
        }
    }
    Ok(loaded)
}

async fn select_first<T: FromRow>(
    eng: &Engine<'_>,
    rendered: &RenderedQuery,
    started: Instant,
) -> Result<Option<T>, SqlRunnerError> {
    let result_set = drive_select(eng, rendered, started).await?;
    match result_set.rows.first() {
        Some(row) => match T::from_row(row) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                eng.report("runner.select.scan", &err, &rendered.sql, started);
                Err(err)
            }
        },
        None => Ok(None),
    }
}

async fn drive_select(
    eng: &Engine<'_>,
    rendered: &RenderedQuery,
    started: Instant,
) -> Result<ResultSet, SqlRunnerError> {
    if let Some(tracer) = eng.tracer {
        tracer.span_start("runner.select", &rendered.sql);
    }
    match eng
        .bounded(eng.driver.query(&rendered.sql, &rendered.values))
        .await
    {
        Ok(result_set) => {
            if let Some(tracer) = eng.tracer {
                tracer.span_finish();
            }
            Ok(result_set)
        }
        Err((message, timed_out)) => {
            let err = eng.execution_error(&rendered.sql, started, message, timed_out);
            if let Some(tracer) = eng.tracer {
                tracer.span_error(&err);
                tracer.span_finish();
            }
            eng.report("runner.select.query", &err, &rendered.sql, started);
            Err(err)
        }
    }
}
