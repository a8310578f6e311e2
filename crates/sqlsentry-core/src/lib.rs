//! sqlsentry-core: SQL safety classification, policy validation and lineage
//!
//! This library decides whether machine-generated SQL may run unattended,
//! checks it against a schema catalog and a security policy, and extracts
//! table and column lineage, all without a database connection.

pub mod analyzer;
pub mod classifier;
pub mod dialect;
pub mod error;
pub mod lineage;
pub mod parser;
pub mod policy;
pub mod schema;

pub use analyzer::{AnalysisReport, Analyzer};
pub use classifier::{classify, contains_nested_mutation, is_safe_to_autorun, StatementClass};
pub use dialect::SqlDialect;
pub use error::{SentryError, SentryResult, Severity, Violation, ViolationKind};
pub use lineage::{
    build_graph, extract_lineage, ColumnLineageEdge, ImpactDirection, LineageGraph, LineageResult,
    TableLineageEdge,
};
pub use parser::{parse, ParseOutcome, SqlStatement};
pub use policy::{normalize_sql, validate, PolicyConfig, PolicyVerdict};
pub use schema::{Catalog, ColumnDef, SchemaBuilder, TableDef};
