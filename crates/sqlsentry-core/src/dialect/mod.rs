//! SQL dialect support

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{AnsiDialect, Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use std::str::FromStr;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Oracle,
    #[serde(alias = "mysql")]
    MariaDb,
    #[serde(alias = "postgres")]
    PostgreSql,
    /// Anything else; parsed with the ANSI grammar
    Generic,
}

/// Grouping of dialects that share row-limit syntax and keyword sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFamily {
    /// `FETCH FIRST n ROWS ONLY` / `ROWNUM <= n`
    Oracle,
    /// `LIMIT n`
    Limit,
}

impl SqlDialect {
    /// Get the sqlparser dialect for parsing
    ///
    /// sqlparser has no Oracle grammar in the pinned release, so Oracle text
    /// goes through the generic grammar, which accepts `FETCH FIRST`, `||`
    /// and bare pseudo-columns such as `ROWNUM` and `SYSDATE`.
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Oracle => Box::new(GenericDialect {}),
            SqlDialect::MariaDb => Box::new(MySqlDialect {}),
            SqlDialect::PostgreSql => Box::new(PostgreSqlDialect {}),
            SqlDialect::Generic => Box::new(AnsiDialect {}),
        }
    }

    pub fn family(&self) -> DialectFamily {
        match self {
            SqlDialect::Oracle | SqlDialect::Generic => DialectFamily::Oracle,
            SqlDialect::MariaDb | SqlDialect::PostgreSql => DialectFamily::Limit,
        }
    }

    /// Resolve a dialect tag, falling back to [`SqlDialect::Generic`] for
    /// anything unrecognized.
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or(SqlDialect::Generic)
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(SqlDialect::Oracle),
            "mariadb" | "mysql" => Ok(SqlDialect::MariaDb),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSql),
            "generic" | "ansi" => Ok(SqlDialect::Generic),
            _ => Err(format!(
                "Unknown dialect: '{}'. Supported dialects: oracle, mariadb, postgresql.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::Oracle => write!(f, "oracle"),
            SqlDialect::MariaDb => write!(f, "mariadb"),
            SqlDialect::PostgreSql => write!(f, "postgresql"),
            SqlDialect::Generic => write!(f, "generic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_tags() {
        assert_eq!("oracle".parse::<SqlDialect>(), Ok(SqlDialect::Oracle));
        assert_eq!("MariaDB".parse::<SqlDialect>(), Ok(SqlDialect::MariaDb));
        assert_eq!("mysql".parse::<SqlDialect>(), Ok(SqlDialect::MariaDb));
        assert_eq!("postgres".parse::<SqlDialect>(), Ok(SqlDialect::PostgreSql));
        assert!("db2".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_unknown_tag_falls_back_to_generic() {
        assert_eq!(SqlDialect::from_tag("sqlite"), SqlDialect::Generic);
        assert_eq!(SqlDialect::from_tag("postgresql"), SqlDialect::PostgreSql);
    }

    #[test]
    fn test_family() {
        assert_eq!(SqlDialect::Oracle.family(), DialectFamily::Oracle);
        assert_eq!(SqlDialect::MariaDb.family(), DialectFamily::Limit);
        assert_eq!(SqlDialect::PostgreSql.family(), DialectFamily::Limit);
    }
}
