//! Security policy: configuration and validation

mod identifiers;
mod normalize;
mod validator;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dialect::{DialectFamily, SqlDialect};
use crate::error::{SentryError, SentryResult};

pub use identifiers::{
    blank_string_literals, extract_cte_names, extract_identifiers, extract_select_aliases,
    mentions_word, stopwords,
};
pub use normalize::normalize_sql;
pub use validator::{validate, PolicyValidator, PolicyVerdict};

/// Which row-limit clauses satisfy the mandatory limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowLimitSyntax {
    /// `FETCH FIRST n ROWS ONLY` or `ROWNUM <= n`
    Oracle,
    /// `LIMIT n`
    Limit,
    /// Any of the above
    Any,
}

impl RowLimitSyntax {
    pub fn for_dialect(dialect: SqlDialect) -> Self {
        match dialect.family() {
            DialectFamily::Oracle => RowLimitSyntax::Oracle,
            DialectFamily::Limit => RowLimitSyntax::Any,
        }
    }

    pub fn accepts_oracle(&self) -> bool {
        matches!(self, RowLimitSyntax::Oracle | RowLimitSyntax::Any)
    }

    pub fn accepts_limit(&self) -> bool {
        matches!(self, RowLimitSyntax::Limit | RowLimitSyntax::Any)
    }

    /// Clause to suggest in the missing-limit message
    pub fn hint(&self, max_rows: u64) -> String {
        match self {
            RowLimitSyntax::Oracle => {
                format!("FETCH FIRST {max_rows} ROWS ONLY or ROWNUM <= {max_rows}")
            }
            RowLimitSyntax::Limit | RowLimitSyntax::Any => format!("LIMIT {max_rows}"),
        }
    }
}

/// Security policy applied to candidate SQL
///
/// Every field has a default, so a partial TOML file only overrides what it
/// names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Dialect assumed when the caller does not name one
    pub dialect: SqlDialect,

    /// Keywords that block a statement wherever they appear
    pub deny_keywords: Vec<String>,

    /// Reject `SELECT *`
    pub ban_wildcard_select: bool,

    /// Ceiling for any row-limit clause
    pub max_rows: u64,

    /// Per-dialect override of accepted row-limit syntax
    pub row_limit: Option<RowLimitSyntax>,

    /// `TABLE.COLUMN` pairs that must never be referenced directly
    pub pii_deny_columns: Vec<String>,

    /// Pre-approved masked expression offered instead of a PII column
    pub pii_mask_expression: String,

    /// Bare table aliases accepted by identifier validation
    pub allowed_aliases: Vec<String>,

    /// Additional keywords or function names ignored by identifier validation
    pub extra_stopwords: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::Oracle,
            deny_keywords: [
                "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "ALTER", "TRUNCATE", "CREATE",
                "GRANT", "REVOKE",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            ban_wildcard_select: true,
            max_rows: 10_000,
            row_limit: None,
            pii_deny_columns: vec!["EMPLOYEE.RRN_BACK".to_string()],
            pii_mask_expression: "e.rrn_front || '-' || RPAD('*', 7, '*') AS rrn_masked"
                .to_string(),
            allowed_aliases: vec!["E".to_string(), "D".to_string(), "S".to_string()],
            extra_stopwords: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Parse a policy from TOML text
    pub fn from_toml_str(contents: &str) -> SentryResult<Self> {
        let config: PolicyConfig =
            toml::from_str(contents).map_err(|e| SentryError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Load a policy from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> SentryResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SentryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the validator cannot enforce
    pub fn check(&self) -> SentryResult<()> {
        if self.max_rows == 0 {
            return Err(SentryError::Config(
                "max_rows must be a positive integer".to_string(),
            ));
        }
        if let Some(entry) = self
            .pii_deny_columns
            .iter()
            .find(|entry| entry.trim().is_empty() || entry.ends_with('.'))
        {
            return Err(SentryError::Config(format!(
                "pii_deny_columns entry '{}' is not a TABLE.COLUMN pair",
                entry
            )));
        }
        Ok(())
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn with_pii_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pii_deny_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allowed_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Accepted row-limit syntax for `dialect`, honoring the override
    pub fn row_limit_for(&self, dialect: SqlDialect) -> RowLimitSyntax {
        self.row_limit
            .unwrap_or_else(|| RowLimitSyntax::for_dialect(dialect))
    }
}
