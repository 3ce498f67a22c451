use async_trait::async_trait;

use crate::error::SqlRunnerError;
use crate::results::ResultSet;
use crate::value::SqlValue;

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

/// The database round-trip capability the engine drives.
///
/// One method per shape: `execute` for mutations, `query` for reads. The
/// engine owns deadlines, instrumentation, and caching; a driver only has to
/// run the SQL it is handed. Implementations are assumed to be externally
/// synchronized for concurrent use.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Run a mutating statement.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ExecOutcome, SqlRunnerError>;

    /// Run a read statement and materialize its rows.
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, SqlRunnerError>;
}
