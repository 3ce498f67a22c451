use std::collections::VecDeque;

use crate::dialect::Dialect;
use crate::driver::ExecOutcome;
use crate::error::SqlRunnerError;
use crate::executor;
use crate::session::Session;
use crate::statement::{Build, Buffer};
use crate::value::SqlValue;

const DEFAULT_RUN_LEN: usize = 1000;

/// A batched update: one `UPDATE … SET col = CASE pk WHEN … END WHERE pk IN
/// (…)` statement per window of rows, instead of one UPDATE per row.
///
/// Rows accumulate via [`CaseUpdateStmt::values`]; each build/execute cycle
/// consumes up to `run_len` rows from the front until the statement is
/// drained. A column name ending in `+` or `-` applies the CASE result as a
/// delta to the current value rather than a replacement.
///
/// Not safe for concurrent execution: the row list is a single-owner cursor.
#[derive(Debug, Clone, Default)]
pub struct CaseUpdateStmt {
    table: String,
    pkey: String,
    columns: Vec<String>,
    rows: VecDeque<CaseUpdateRow>,
    run_len: Option<usize>,
}

#[derive(Debug, Clone)]
struct CaseUpdateRow {
    key: String,
    values: Vec<SqlValue>,
}

impl CaseUpdateStmt {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Name the primary key column and the columns to update, in the order
    /// row values will be supplied.
    #[must_use]
    pub fn columns<I, S>(mut self, pkey: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pkey = pkey.into();
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add one row: a primary key value plus one value per column.
    ///
    /// Accumulating the same primary key again replaces the earlier values;
    /// a key never gets two WHEN clauses.
    #[must_use]
    pub fn values<I, V>(mut self, pk: impl std::fmt::Display, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let key = pk.to_string();
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        if let Some(existing) = self.rows.iter_mut().find(|row| row.key == key) {
            existing.values = values;
        } else {
            self.rows.push_back(CaseUpdateRow { key, values });
        }
        self
    }

    /// Rows consumed per execute cycle. Defaults to 1000 when unset; 0 opts
    /// in to a single unbounded window over everything left.
    #[must_use]
    pub fn run_len(mut self, run_len: usize) -> Self {
        self.run_len = Some(run_len);
        self
    }

    /// Rows not yet consumed by a window.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.rows.is_empty()
    }

    /// Detach the next window, removing its rows from the front.
    ///
    /// # Errors
    ///
    /// `TableNotSpecified` / `ColumnNotSpecified` before any SQL is emitted,
    /// `Config` when a row's value count doesn't match the column list. No
    /// rows are consumed on error.
    pub(crate) fn take_window(&mut self) -> Result<CaseUpdateWindow<'_>, SqlRunnerError> {
        if self.table.is_empty() {
            return Err(SqlRunnerError::TableNotSpecified);
        }
        if self.columns.is_empty() {
            return Err(SqlRunnerError::ColumnNotSpecified);
        }
        let limit = match self.run_len {
            None => DEFAULT_RUN_LEN,
            Some(0) => self.rows.len(),
            Some(n) => n,
        };
        let take = limit.min(self.rows.len());
        for row in self.rows.iter().take(take) {
            if row.values.len() != self.columns.len() {
                return Err(SqlRunnerError::Config(format!(
                    "case update row {} has {} values but {} columns",
                    row.key,
                    row.values.len(),
                    self.columns.len()
                )));
            }
        }
        let rows: Vec<CaseUpdateRow> = self.rows.drain(..take).collect();
        Ok(CaseUpdateWindow {
            table: &self.table,
            pkey: &self.pkey,
            columns: &self.columns,
            rows,
        })
    }
}

/// One consumed window, ready to render. Single owner of its rows.
pub(crate) struct CaseUpdateWindow<'a> {
    table: &'a str,
    pkey: &'a str,
    columns: &'a [String],
    rows: Vec<CaseUpdateRow>,
}

fn split_op(column: &str) -> (&str, Option<&'static str>) {
    if let Some(base) = column.strip_suffix('+') {
        (base, Some("+"))
    } else if let Some(base) = column.strip_suffix('-') {
        (base, Some("-"))
    } else {
        (column, None)
    }
}

impl Build for CaseUpdateWindow<'_> {
    fn build(&self, dialect: &dyn Dialect, buf: &mut Buffer) -> Result<(), SqlRunnerError> {
        buf.write_sql("UPDATE ");
        buf.write_ident(dialect, self.table)?;
        buf.write_sql(" SET ");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                buf.write_sql(", ");
            }
            let (name, op) = split_op(column);
            buf.write_ident(dialect, name)?;
            buf.write_sql(" = ");
            if let Some(op) = op {
                // delta: apply the CASE result to the current value
                buf.write_ident(dialect, name)?;
                buf.write_sql(" ");
                buf.write_sql(op);
                buf.write_sql(" ");
            }
            buf.write_sql("CASE ");
            buf.write_ident(dialect, self.pkey)?;
            for row in &self.rows {
                buf.write_sql(" WHEN ? THEN ?");
                buf.write_value(SqlValue::Text(row.key.clone()));
                // length validated in take_window
                buf.write_value(row.values[i].clone());
            }
            buf.write_sql(" END");
        }
        buf.write_sql(" WHERE ");
        buf.write_ident(dialect, self.pkey)?;
        buf.write_sql(" IN (");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                buf.write_sql(", ");
            }
            buf.write_sql("?");
            buf.write_value(SqlValue::Text(row.key.clone()));
        }
        buf.write_sql(")");
        Ok(())
    }
}

/// A [`CaseUpdateStmt`] bound to a session, with the drain loop.
#[derive(Debug)]
pub struct SessionCaseUpdate<'s> {
    session: &'s Session,
    stmt: CaseUpdateStmt,
}

impl<'s> SessionCaseUpdate<'s> {
    pub(crate) fn new(session: &'s Session, table: impl Into<String>) -> Self {
        Self {
            session,
            stmt: CaseUpdateStmt::new(table),
        }
    }

    /// Bind an already-accumulated statement to a session.
    pub fn attach(session: &'s Session, stmt: CaseUpdateStmt) -> Self {
        Self { session, stmt }
    }

    #[must_use]
    pub fn columns<I, S>(mut self, pkey: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stmt = self.stmt.columns(pkey, columns);
        self
    }

    #[must_use]
    pub fn values<I, V>(mut self, pk: impl std::fmt::Display, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.stmt = self.stmt.values(pk, values);
        self
    }

    #[must_use]
    pub fn run_len(mut self, run_len: usize) -> Self {
        self.stmt = self.stmt.run_len(run_len);
        self
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stmt.remaining()
    }

    #[must_use]
    pub fn into_stmt(self) -> CaseUpdateStmt {
        self.stmt
    }

    /// Run windows until the row list is empty, stopping at the first
    /// execution error. Windows already applied stay applied; there is no
    /// cross-window atomicity.
    ///
    /// # Errors
    ///
    /// The first error from any window: configuration, interpolation, or
    /// execution.
    pub async fn exec(mut self) -> Result<(), SqlRunnerError> {
        while !self.stmt.is_drained() {
            self.exec_window().await?;
        }
        Ok(())
    }

    /// Run a single window. A drained statement is a no-op.
    ///
    /// # Errors
    ///
    /// As [`SessionCaseUpdate::exec`], for this window only.
    pub async fn exec_window(&mut self) -> Result<ExecOutcome, SqlRunnerError> {
        if self.stmt.is_drained() {
            return Ok(ExecOutcome::default());
        }
        let session = self.session;
        let window = self.stmt.take_window()?;
        executor::exec(&session.engine(), &window, None).await
    }
}
