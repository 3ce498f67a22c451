use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

/// Everything that can go wrong while building, rendering, or running a
/// statement.
///
/// The engine treats `Cache` as strictly non-fatal: it is reported to the
/// event sink and the call falls through to the database. Every other variant
/// stops the call and is returned to the caller after one sink report.
#[derive(Debug, Error)]
pub enum SqlRunnerError {
    #[error("table not specified")]
    TableNotSpecified,

    #[error("column not specified")]
    ColumnNotSpecified,

    #[error("cache key not specified")]
    CacheKeyNotSpecified,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("interpolation error: {0}")]
    Interpolation(String),

    /// Driver failure or deadline expiry, with the rendered SQL and elapsed
    /// time attached.
    #[error("execution failed after {elapsed_ms}ms: {message} (sql: {sql})")]
    Execution {
        sql: String,
        elapsed_ms: u64,
        timed_out: bool,
        message: String,
    },

    #[error("row decode error: {0}")]
    Decode(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl SqlRunnerError {
    /// Whether this error came from a deadline expiring mid round trip.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, SqlRunnerError::Execution { timed_out: true, .. })
    }
}
