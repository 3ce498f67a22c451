/// Identifier quoting plus the placeholder token for one database family.
///
/// Kept deliberately small: the interpolator owns literal encoding, so a
/// dialect only has to answer how identifiers are quoted and what a bound
/// parameter looks like in the final SQL text.
pub trait Dialect: Send + Sync {
    /// Quote a single identifier (never a dotted path).
    fn quote_ident(&self, ident: &str) -> String;

    /// The placeholder token emitted for values that stay bound.
    fn placeholder(&self) -> &'static str;
}

/// MySQL-family quoting: backticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self) -> &'static str {
        "?"
    }
}

/// SQLite-family quoting: double quotes (the standard style; SQLite also
/// accepts backticks and brackets).
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self) -> &'static str {
        "?"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_embedded_quote_chars() {
        assert_eq!(MysqlDialect.quote_ident("a`b"), "`a``b`");
        assert_eq!(SqliteDialect.quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
