use crate::dialect::Dialect;
use crate::error::SqlRunnerError;
use crate::statement::{Build, Buffer, RenderedQuery};
use crate::value::SqlValue;

/// Render a statement into final SQL text plus the values that stay bound.
///
/// The statement writes SQL with `?` markers and pushes values in order; this
/// pass pairs each marker with the next value. Everything except binary blobs
/// is inlined as a literal; blobs are emitted as the dialect's placeholder
/// token and returned in `RenderedQuery::values`. Markers inside string
/// literals and comments are left alone.
///
/// Identical input always produces byte-identical output.
///
/// # Errors
///
/// Returns `SqlRunnerError::Interpolation` when the marker and value counts
/// disagree, or whatever error the statement's own `build` raises.
pub fn interpolate(
    stmt: &dyn Build,
    dialect: &dyn Dialect,
) -> Result<RenderedQuery, SqlRunnerError> {
    let mut buf = Buffer::new();
    stmt.build(dialect, &mut buf)?;
    let (raw, values) = buf.into_parts();
    expand(&raw, values, dialect)
}

enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

fn expand(
    raw: &str,
    values: Vec<SqlValue>,
    dialect: &dyn Dialect,
) -> Result<RenderedQuery, SqlRunnerError> {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut bound = Vec::new();
    let mut pending = values.into_iter();
    let mut state = State::Normal;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '?' => {
                    let value = pending.next().ok_or_else(|| {
                        SqlRunnerError::Interpolation(format!(
                            "more placeholders than values (sql: {raw})"
                        ))
                    })?;
                    if matches!(value, SqlValue::Blob(_)) {
                        out.push_str(dialect.placeholder());
                        bound.push(value);
                    } else {
                        encode_literal(&value, &mut out);
                    }
                    continue;
                }
                '\'' => {
                    state = State::SingleQuoted;
                    out.push(c);
                    continue;
                }
                '"' => {
                    state = State::DoubleQuoted;
                    out.push(c);
                    continue;
                }
                '-' if chars.peek() == Some(&'-') => {
                    state = State::LineComment;
                    out.push(c);
                    continue;
                }
                '/' if chars.peek() == Some(&'*') => {
                    out.push(c);
                    out.push(chars.next().unwrap_or('*'));
                    state = State::BlockComment(1);
                    continue;
                }
                _ => {
                    out.push(c);
                    continue;
                }
            },
            State::SingleQuoted => {
                out.push(c);
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        // escaped quote, stay inside the literal
                        out.push(chars.next().unwrap_or('\''));
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                out.push(c);
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        out.push(chars.next().unwrap_or('"'));
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                out.push(c);
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                out.push(c);
                if c == '/' && chars.peek() == Some(&'*') {
                    out.push(chars.next().unwrap_or('*'));
                    state = State::BlockComment(depth + 1);
                } else if c == '*' && chars.peek() == Some(&'/') {
                    out.push(chars.next().unwrap_or('/'));
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                }
            }
        }
    }

    if pending.next().is_some() {
        return Err(SqlRunnerError::Interpolation(format!(
            "more values than placeholders (sql: {raw})"
        )));
    }

    Ok(RenderedQuery { sql: out, values: bound })
}

fn encode_literal(value: &SqlValue, out: &mut String) {
    match value {
        SqlValue::Int(i) => out.push_str(&i.to_string()),
        SqlValue::Float(f) => out.push_str(&f.to_string()),
        SqlValue::Bool(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        SqlValue::Null => out.push_str("NULL"),
        SqlValue::Text(s) => encode_text(s, out),
        SqlValue::Timestamp(dt) => {
            out.push('\'');
            out.push_str(&dt.format("%F %T%.f").to_string());
            out.push('\'');
        }
        SqlValue::Json(j) => encode_text(&j.to_string(), out),
        // bound upstream, never inlined
        SqlValue::Blob(_) => {}
    }
}

fn encode_text(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}
