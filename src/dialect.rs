use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Supported relational engine flavors.
///
/// Every dialect-sensitive choice in the crate — operator spelling,
/// placeholder style, identifier quoting, DDL spellings — lives here as a
/// capability method, so adding an engine is a single-file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
    Mysql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            other => Err(StoreError::backend(format!("Unknown dialect: {}", other))),
        }
    }
}

impl Dialect {
    /// Canonical lowercase tag, also used to match raw-query entries.
    pub fn tag(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
        }
    }

    /// Whether the engine has a case-insensitive pattern operator.
    pub fn supports_ilike(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    pub fn like_operator(&self, negated: bool) -> &'static str {
        match (self.supports_ilike(), negated) {
            (true, false) => "ILIKE",
            (true, true) => "NOT ILIKE",
            (false, false) => "LIKE",
            (false, true) => "NOT LIKE",
        }
    }

    /// Positional bind placeholder for the n-th bound value (1-indexed).
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite | Dialect::Mysql => "?".to_string(),
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", ident),
        }
    }

    /// Expression projecting a boolean column as an integer, for
    /// cross-dialect comparability in grouped projections.
    pub fn bool_to_int_expr(&self, quoted_column: &str) -> String {
        match self {
            Dialect::Mysql => format!("CAST({} AS UNSIGNED)", quoted_column),
            Dialect::Postgres | Dialect::Sqlite => {
                format!("CAST({} AS INTEGER)", quoted_column)
            }
        }
    }

    /// Full column clause for the synthesized auto-increment primary key.
    pub fn autoincrement_pk(&self, quoted_column: &str) -> String {
        match self {
            Dialect::Postgres => format!("{} BIGSERIAL PRIMARY KEY", quoted_column),
            Dialect::Sqlite => {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted_column)
            }
            Dialect::Mysql => format!(
                "{} BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY",
                quoted_column
            ),
        }
    }

    /// MySQL has no `CREATE INDEX IF NOT EXISTS`; its secondary indexes go
    /// inline in the CREATE TABLE body instead.
    pub fn inline_index_ddl(&self) -> bool {
        matches!(self, Dialect::Mysql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::Mysql);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_like_operator_spelling() {
        assert_eq!(Dialect::Postgres.like_operator(false), "ILIKE");
        assert_eq!(Dialect::Postgres.like_operator(true), "NOT ILIKE");
        assert_eq!(Dialect::Sqlite.like_operator(false), "LIKE");
        assert_eq!(Dialect::Mysql.like_operator(true), "NOT LIKE");
    }

    #[test]
    fn test_placeholders_and_quoting() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::Mysql.quote_ident("name"), "`name`");
        assert_eq!(Dialect::Postgres.quote_ident("name"), "\"name\"");
    }
}
