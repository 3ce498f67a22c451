use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SqlRunnerError;
use crate::value::SqlValue;

/// A single row from a query result.
///
/// Column names and the name→index map are shared across all rows of a
/// result set.
#[derive(Debug, Clone)]
pub struct SqlRow {
    column_names: Arc<Vec<String>>,
    values: Vec<SqlValue>,
    column_index: Arc<HashMap<String, usize>>,
}

impl SqlRow {
    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.column_index
            .get(column_name)
            .and_then(|&idx| self.values.get(idx))
    }

    /// Get a value by position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// The materialized result of a query.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub rows: Vec<SqlRow>,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            rows: Vec::with_capacity(capacity),
            column_names: None,
            column_index: None,
        }
    }

    /// Set the column names shared by every row. Builds the name→index map
    /// once; rows added afterwards reuse it.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        let index = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        self.column_index = Some(Arc::new(index));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row of values. Requires `set_column_names` to have been
    /// called first.
    ///
    /// # Errors
    ///
    /// Returns `SqlRunnerError::Decode` if no column names are set or the
    /// value count doesn't match the column count.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) -> Result<(), SqlRunnerError> {
        let (Some(column_names), Some(column_index)) =
            (self.column_names.as_ref(), self.column_index.as_ref())
        else {
            return Err(SqlRunnerError::Decode(
                "no column names available".to_string(),
            ));
        };
        if values.len() != column_names.len() {
            return Err(SqlRunnerError::Decode(format!(
                "row has {} values but {} columns",
                values.len(),
                column_names.len()
            )));
        }
        self.rows.push(SqlRow {
            column_names: column_names.clone(),
            values,
            column_index: column_index.clone(),
        });
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Explicit row-to-field mapping for query destinations.
///
/// Implemented by hand per destination shape; there is no reflection:
/// ```rust
/// use sql_runner::prelude::*;
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
///         Ok(User {
///             id: *row
///                 .get("id")
///                 .and_then(SqlValue::as_int)
///                 .ok_or_else(|| SqlRunnerError::Decode("user.id".into()))?,
///             name: row
///                 .get("name")
///                 .and_then(SqlValue::as_text)
///                 .ok_or_else(|| SqlRunnerError::Decode("user.name".into()))?
///                 .to_string(),
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Decode one row.
    ///
    /// # Errors
    ///
    /// Returns `SqlRunnerError::Decode` when a column is missing or has an
    /// unexpected type. Decode failures on the database path are fatal.
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError>;
}

// Scalar destinations scan the first column.

impl FromRow for i64 {
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
        row.get_by_index(0)
            .and_then(SqlValue::as_int)
            .copied()
            .ok_or_else(|| SqlRunnerError::Decode("expected integer in column 0".to_string()))
    }
}

impl FromRow for String {
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
        row.get_by_index(0)
            .and_then(SqlValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| SqlRunnerError::Decode("expected text in column 0".to_string()))
    }
}

impl FromRow for f64 {
    fn from_row(row: &SqlRow) -> Result<Self, SqlRunnerError> {
        row.get_by_index(0)
            .and_then(SqlValue::as_float)
            .ok_or_else(|| SqlRunnerError::Decode("expected float in column 0".to_string()))
    }
}
