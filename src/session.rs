use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::CacheDirective;
use crate::case_update::SessionCaseUpdate;
use crate::dialect::Dialect;
use crate::driver::{Driver, ExecOutcome};
use crate::error::SqlRunnerError;
use crate::event::{EventSink, NullEventSink, TracingEventSink};
use crate::executor::{self, Engine};
use crate::results::FromRow;
use crate::statement::Build;

/// A business unit of execution: a driver, a dialect, an event sink, an
/// optional tracing capability and an optional deadline.
///
/// Sessions hold no mutable state; concurrent calls on one session are
/// independent. The tracing capability is resolved once at construction, not
/// probed per call.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sql_runner::prelude::*;
///
/// # async fn demo() -> Result<(), SqlRunnerError> {
/// let driver = Arc::new(SqliteDriver::open_in_memory()?);
/// let session = Session::new(driver, Arc::new(SqliteDialect));
///
/// session
///     .execute(&RawStatement::new(
///         "INSERT INTO t (id) VALUES (?)",
///         vec![SqlValue::Int(1)],
///     ))
///     .await?;
/// # Ok(()) }
/// ```
pub struct Session {
    driver: Arc<dyn Driver>,
    dialect: Arc<dyn Dialect>,
    sink: Arc<dyn EventSink>,
    tracer: Option<Arc<dyn TracingEventSink>>,
    timeout: Option<Duration>,
}

impl Session {
    /// New session with the default (verbosity-gated) sink, no tracing and no
    /// deadline.
    pub fn new(driver: Arc<dyn Driver>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            driver,
            dialect,
            sink: Arc::new(NullEventSink),
            tracer: None,
            timeout: None,
        }
    }

    /// Replace the event sink. Clears any tracing capability captured from a
    /// previous sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self.tracer = None;
        self
    }

    /// Install a sink that also carries the tracing capability.
    #[must_use]
    pub fn with_tracing_sink<S: TracingEventSink + 'static>(mut self, sink: Arc<S>) -> Self {
        self.sink = sink.clone();
        self.tracer = Some(sink);
        self
    }

    /// Bound every driver and cache round trip in this session by `timeout`.
    /// Unset means unbounded.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub(crate) fn engine(&self) -> Engine<'_> {
        Engine {
            driver: self.driver.as_ref(),
            dialect: self.dialect.as_ref(),
            sink: self.sink.as_ref(),
            tracer: self.tracer.as_deref(),
            timeout: self.timeout,
        }
    }

    /// Run a mutating statement.
    ///
    /// # Errors
    ///
    /// `Interpolation` if the statement fails to render (no driver call is
    /// made), `Execution` on driver failure or deadline expiry.
    pub async fn execute(&self, stmt: &dyn Build) -> Result<ExecOutcome, SqlRunnerError> {
        executor::exec(&self.engine(), stmt, None).await
    }

    /// Run a mutating statement, then delete the directive's cache key.
    ///
    /// Invalidation failures are reported to the sink and swallowed; they
    /// never mask a successful write. An empty key skips invalidation.
    ///
    /// # Errors
    ///
    /// Same as [`Session::execute`].
    pub async fn execute_invalidating(
        &self,
        stmt: &dyn Build,
        directive: &CacheDirective,
    ) -> Result<ExecOutcome, SqlRunnerError> {
        executor::exec(&self.engine(), stmt, Some(directive)).await
    }

    /// Run a read statement, appending decoded rows to `dest`. Returns the
    /// number of rows decoded.
    ///
    /// # Errors
    ///
    /// `Interpolation`, `Execution`, or `Decode` if a row fails to map.
    pub async fn load<T: FromRow>(
        &self,
        stmt: &dyn Build,
        dest: &mut Vec<T>,
    ) -> Result<usize, SqlRunnerError> {
        executor::query_rows(&self.engine(), stmt, dest).await
    }

    /// [`Session::load`] through the read-through cache: on a hit the
    /// database is never touched; cache failures degrade to a real query.
    ///
    /// # Errors
    ///
    /// As [`Session::load`], plus `CacheKeyNotSpecified` for an empty key.
    /// Cache backend/codec failures are never returned.
    pub async fn load_cached<T>(
        &self,
        stmt: &dyn Build,
        dest: &mut Vec<T>,
        directive: &CacheDirective,
    ) -> Result<usize, SqlRunnerError>
    where
        T: FromRow + Serialize + DeserializeOwned,
    {
        executor::query_rows_cached(&self.engine(), stmt, dest, directive).await
    }

    /// Run a read statement and decode the first row, if any.
    ///
    /// # Errors
    ///
    /// As [`Session::load`].
    pub async fn load_one<T: FromRow>(
        &self,
        stmt: &dyn Build,
    ) -> Result<Option<T>, SqlRunnerError> {
        executor::query_one(&self.engine(), stmt).await
    }

    /// [`Session::load_one`] through the read-through cache.
    ///
    /// # Errors
    ///
    /// As [`Session::load_cached`].
    pub async fn load_one_cached<T>(
        &self,
        stmt: &dyn Build,
        directive: &CacheDirective,
    ) -> Result<Option<T>, SqlRunnerError>
    where
        T: FromRow + Serialize + DeserializeOwned,
    {
        executor::query_one_cached(&self.engine(), stmt, directive).await
    }

    /// Count the rows a statement would return, via
    /// `SELECT COUNT(*) FROM (<sql>) AS count`.
    ///
    /// # Errors
    ///
    /// `Interpolation` or `Execution`.
    pub async fn load_count(&self, stmt: &dyn Build) -> Result<i64, SqlRunnerError> {
        executor::query_count(&self.engine(), stmt, None).await
    }

    /// [`Session::load_count`] through the read-through cache; the cached
    /// entry is the integer itself.
    ///
    /// # Errors
    ///
    /// As [`Session::load_count`], plus `CacheKeyNotSpecified` for an empty
    /// key.
    pub async fn load_count_cached(
        &self,
        stmt: &dyn Build,
        directive: &CacheDirective,
    ) -> Result<i64, SqlRunnerError> {
        executor::query_count(&self.engine(), stmt, Some(directive)).await
    }

    /// Start a batched case-update against `table`.
    pub fn case_update(&self, table: impl Into<String>) -> SessionCaseUpdate<'_> {
        SessionCaseUpdate::new(self, table)
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            dialect: self.dialect.clone(),
            sink: self.sink.clone(),
            tracer: self.tracer.clone(),
            timeout: self.timeout,
        }
    }
}

// Manual Debug because the capability fields are trait objects.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("timeout", &self.timeout)
            .field("traced", &self.tracer.is_some())
            .finish_non_exhaustive()
    }
}
