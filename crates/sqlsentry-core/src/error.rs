//! Error and violation types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors from loading configuration or schema input
///
/// The analysis entry points never return this type: parse failures and
/// policy violations are reported as data.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SentryError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(sqlsentry::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy configuration: {0}")]
    #[diagnostic(
        code(sqlsentry::config),
        help("check the policy TOML against the documented fields")
    )]
    Config(String),

    #[error("invalid schema catalog: {0}")]
    #[diagnostic(
        code(sqlsentry::catalog),
        help("expected a mapping of table name to columns, primaryKey and foreignKeys")
    )]
    Catalog(String),

    #[error("could not parse schema DDL: {0}")]
    #[diagnostic(code(sqlsentry::schema_ddl))]
    SchemaDdl(String),
}

pub type SentryResult<T> = Result<T, SentryError>;

/// Violation severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks automatic execution
    Error,
    /// Advisory only
    Warning,
}

/// A single policy finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub help: Option<String>,
}

impl Violation {
    pub fn error(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: sanitize_message(&message.into()),
            help: None,
        }
    }

    pub fn warning(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            message: sanitize_message(&message.into()),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(sanitize_message(&help.into()));
        self
    }

    /// Get the code string (e.g., "P0001")
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Types of policy findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// P0000: Nothing left after stripping fences and comments
    EmptyStatement,
    /// P0001: DML/DDL/DCL keyword present
    DenyKeyword,
    /// P0002: `SELECT *`
    WildcardSelect,
    /// P0003: No row-limit clause
    MissingRowLimit,
    /// P0004: Row-limit clause above the configured ceiling
    RowLimitExceeded,
    /// P0005: Denylisted PII column referenced
    PiiReference,
    /// P0006: Identifier not found in the schema catalog
    UnknownIdentifier,
    /// P0007: Parser could not read the statement
    Unparseable,
    /// P0008: Statement is not a plain read
    NotReadOnly,
}

impl ViolationKind {
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::EmptyStatement => "P0000",
            ViolationKind::DenyKeyword => "P0001",
            ViolationKind::WildcardSelect => "P0002",
            ViolationKind::MissingRowLimit => "P0003",
            ViolationKind::RowLimitExceeded => "P0004",
            ViolationKind::PiiReference => "P0005",
            ViolationKind::UnknownIdentifier => "P0006",
            ViolationKind::Unparseable => "P0007",
            ViolationKind::NotReadOnly => "P0008",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViolationKind::EmptyStatement => "empty-statement",
            ViolationKind::DenyKeyword => "deny-keyword",
            ViolationKind::WildcardSelect => "wildcard-select",
            ViolationKind::MissingRowLimit => "missing-row-limit",
            ViolationKind::RowLimitExceeded => "row-limit-exceeded",
            ViolationKind::PiiReference => "pii-reference",
            ViolationKind::UnknownIdentifier => "unknown-identifier",
            ViolationKind::Unparseable => "unparseable",
            ViolationKind::NotReadOnly => "not-read-only",
        }
    }
}

/// Escape control characters so messages are safe to display verbatim
pub fn sanitize_message(message: &str) -> String {
    if !message.chars().any(char::is_control) {
        return message.to_string();
    }
    message
        .chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' '.to_string(),
            c if c.is_control() => c.escape_unicode().to_string(),
            c => c.to_string(),
        })
        .collect()
}
