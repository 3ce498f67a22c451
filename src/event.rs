use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::SqlRunnerError;

/// Receives success/error/timing notifications from the engine.
///
/// All methods default to no-ops so a sink only overrides what it cares
/// about. Fields arrive as `(name, value)` pairs; the engine supplies `sql`
/// and `time` (elapsed milliseconds) where it has them.
pub trait EventSink: Send + Sync {
    fn event(&self, _name: &str) {}

    fn event_with_fields(&self, _name: &str, _fields: &[(&str, &str)]) {}

    fn error(&self, _name: &str, _err: &SqlRunnerError) {}

    fn error_with_fields(&self, _name: &str, _err: &SqlRunnerError, _fields: &[(&str, &str)]) {}

    fn timing(&self, _name: &str, _nanoseconds: u64) {}

    fn timing_with_fields(&self, _name: &str, _nanoseconds: u64, _fields: &[(&str, &str)]) {}
}

/// Optional tracing extension a sink can also implement.
///
/// The session resolves this capability once at construction
/// ([`crate::session::Session::with_tracing_sink`]); the engine never probes
/// for it per call.
pub trait TracingEventSink: EventSink {
    fn span_start(&self, event_name: &str, sql: &str);

    fn span_error(&self, err: &SqlRunnerError);

    fn span_finish(&self);
}

static SHOW_SQL_LEVEL: AtomicU8 = AtomicU8::new(0);

/// Process-wide verbosity for the default sink.
///
/// 0 = silent, 1 = errors only, 2 = errors and successes. Set once at
/// startup; the default sink reads it on every event.
pub fn show_sql(level: u8) {
    SHOW_SQL_LEVEL.store(level, Ordering::Relaxed);
}

pub(crate) fn show_sql_level() -> u8 {
    SHOW_SQL_LEVEL.load(Ordering::Relaxed)
}

/// The sink used when the caller doesn't supply one.
///
/// Silent by default; with [`show_sql`] raised it emits one `tracing` line
/// per event carrying the event name, elapsed time, and SQL text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

fn lookup<'a>(fields: &'a [(&str, &str)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

impl EventSink for NullEventSink {
    fn error_with_fields(&self, name: &str, err: &SqlRunnerError, fields: &[(&str, &str)]) {
        if show_sql_level() >= 1 {
            let sql = lookup(fields, "sql").unwrap_or("");
            let time = lookup(fields, "time").unwrap_or("-");
            tracing::error!(target: "sql_runner", event = name, time_ms = time, sql, "{err}");
        }
    }

    fn error(&self, name: &str, err: &SqlRunnerError) {
        self.error_with_fields(name, err, &[]);
    }

    fn timing_with_fields(&self, name: &str, nanoseconds: u64, fields: &[(&str, &str)]) {
        if show_sql_level() >= 2 {
            let sql = lookup(fields, "sql").unwrap_or("");
            tracing::info!(
                target: "sql_runner",
                event = name,
                time_ms = nanoseconds / 1_000_000,
                sql,
                "ok"
            );
        }
    }

    fn timing(&self, name: &str, nanoseconds: u64) {
        self.timing_with_fields(name, nanoseconds, &[]);
    }
}
