//! Dialect-aware parser adapter
//!
//! Wraps sqlparser so that callers get a [`ParseOutcome`] instead of an
//! error: malformed or unsupported SQL resolves to [`ParseOutcome::Failed`]
//! and the classifier and validator take their textual fallback paths.

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;

use crate::dialect::SqlDialect;

/// Raw SQL text together with the dialect it was written for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub text: String,
    pub dialect: SqlDialect,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>, dialect: SqlDialect) -> Self {
        Self {
            text: text.into(),
            dialect,
        }
    }

    pub fn parse(&self) -> ParseOutcome {
        parse(&self.text, self.dialect)
    }
}

/// Result of handing SQL text to the parser
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// One entry per semicolon-separated statement, in source order
    Parsed(Vec<Statement>),
    Failed(String),
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn statements(&self) -> Option<&[Statement]> {
        match self {
            ParseOutcome::Parsed(statements) => Some(statements),
            ParseOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            ParseOutcome::Parsed(_) => None,
            ParseOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Parse a batch of statements for the given dialect
///
/// Never panics and never returns an error: empty input and parser errors
/// both resolve to [`ParseOutcome::Failed`].
pub fn parse(sql: &str, dialect: SqlDialect) -> ParseOutcome {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Failed("empty statement".to_string());
    }

    let parser_dialect = dialect.parser_dialect();
    match Parser::parse_sql(parser_dialect.as_ref(), trimmed) {
        Ok(statements) if statements.is_empty() => {
            ParseOutcome::Failed("no statements found".to_string())
        }
        Ok(statements) => {
            tracing::trace!(%dialect, count = statements.len(), "parsed SQL");
            ParseOutcome::Parsed(statements)
        }
        Err(e) => {
            tracing::debug!(%dialect, error = %e, "SQL did not parse");
            ParseOutcome::Failed(e.to_string())
        }
    }
}

/// Split SQL text into individual statements by semicolons,
/// respecting string literals, quoted identifiers and comments.
pub fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < len {
                    if bytes[i] == quote {
                        i += 1;
                        if i < len && bytes[i] == quote {
                            i += 1; // doubled quote
                        } else {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i += 2;
                while i < len {
                    if i + 1 < len && bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b';' => {
                let stmt = &sql[start..i];
                if !stmt.trim().is_empty() {
                    statements.push(stmt);
                }
                start = i + 1;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let last = &sql[start.min(len)..];
    if !last.trim().is_empty() {
        statements.push(last);
    }

    statements
}
