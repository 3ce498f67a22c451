//! Composable SQL statement execution with uniform instrumentation and an
//! optional read-through cache.
//!
//! A [`session::Session`] bundles the capabilities one call needs: a
//! [`driver::Driver`], a [`dialect::Dialect`], an [`event::EventSink`] (with
//! an optional tracing extension) and an optional deadline. Statements
//! implement [`statement::Build`]; the [`interpolate`] pass renders them to
//! final SQL with only binary blobs left as bound parameters, the engine
//! round-trips them through the driver, and a per-call
//! [`cache::CacheDirective`] short-circuits reads or invalidates writes.
//! [`case_update::CaseUpdateStmt`] folds many single-row updates into
//! windowed `CASE` statements.
//!
//! Cache failures of any kind are reported to the sink and bypassed; the
//! database path is never blocked on the cache.

pub mod cache;
pub mod case_update;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod event;
pub mod interpolate;
pub mod prelude;
pub mod results;
pub mod session;
pub mod statement;
pub mod value;

mod executor;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::SqlRunnerError;
pub use session::Session;
