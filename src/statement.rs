use crate::dialect::Dialect;
use crate::error::SqlRunnerError;
use crate::value::SqlValue;

/// A statement fragment that can render itself into a [`Buffer`].
///
/// Implementations write SQL text with `?` markers and push the matching
/// values in order; the interpolator later pairs the two. Statements are
/// built once and borrowed by the engine for a single call.
pub trait Build {
    /// Render this fragment.
    ///
    /// # Errors
    ///
    /// Returns `SqlRunnerError` when the fragment is not renderable, e.g. a
    /// missing table name or an empty identifier.
    fn build(&self, dialect: &dyn Dialect, buf: &mut Buffer) -> Result<(), SqlRunnerError>;
}

/// Accumulates SQL text and the ordered bound values during a build.
#[derive(Debug, Default)]
pub struct Buffer {
    sql: String,
    values: Vec<SqlValue>,
}

impl Buffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_sql(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub fn write_value(&mut self, value: impl Into<SqlValue>) {
        self.values.push(value.into());
    }

    /// Quote and append an identifier.
    ///
    /// # Errors
    ///
    /// Returns `SqlRunnerError::Interpolation` for an empty identifier.
    pub fn write_ident(&mut self, dialect: &dyn Dialect, ident: &str) -> Result<(), SqlRunnerError> {
        if ident.is_empty() {
            return Err(SqlRunnerError::Interpolation("empty identifier".to_string()));
        }
        self.sql.push_str(&dialect.quote_ident(ident));
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.values)
    }
}

/// Final, executable SQL text plus the values that stayed bound.
///
/// Re-rendered on every execution cycle; never cached between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// A raw SQL string with `?` markers and its values, bundled as one unit.
///
/// The escape hatch for statements assembled elsewhere:
/// ```rust
/// use sql_runner::prelude::*;
///
/// let stmt = RawStatement::new(
///     "SELECT id, name FROM users WHERE id = ?",
///     vec![SqlValue::Int(1)],
/// );
/// # let _ = stmt;
/// ```
#[derive(Debug, Clone)]
pub struct RawStatement {
    sql: String,
    values: Vec<SqlValue>,
}

impl RawStatement {
    pub fn new(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    pub fn without_params(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }
}

impl Build for RawStatement {
    fn build(&self, _dialect: &dyn Dialect, buf: &mut Buffer) -> Result<(), SqlRunnerError> {
        buf.write_sql(&self.sql);
        for value in &self.values {
            buf.write_value(value.clone());
        }
        Ok(())
    }
}
