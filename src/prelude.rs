//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits so callers
//! can get started with a single `use`.

pub use crate::cache::{CacheDirective, QueryCache};
pub use crate::case_update::{CaseUpdateStmt, SessionCaseUpdate};
pub use crate::dialect::{Dialect, MysqlDialect, SqliteDialect};
pub use crate::driver::{Driver, ExecOutcome};
pub use crate::error::SqlRunnerError;
pub use crate::event::{EventSink, NullEventSink, TracingEventSink, show_sql};
pub use crate::interpolate::interpolate;
pub use crate::results::{FromRow, ResultSet, SqlRow};
pub use crate::session::Session;
pub use crate::statement::{Build, Buffer, RawStatement, RenderedQuery};
pub use crate::value::SqlValue;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
