//! Table and column lineage
//!
//! [`extract_lineage`] reads lineage out of SQL text, [`LineageGraph`] turns
//! it into a column-level graph for impact queries, and the Mermaid
//! renderers draw it.

mod extractor;
mod graph;
mod mermaid;

use serde::{Deserialize, Serialize};

pub use extractor::{collect_cte_names, extract_lineage, extract_lineage_outcome};
pub use graph::{
    build_graph, ExportEdge, ExportNode, GraphExport, ImpactDirection, LineageGraph, LineageNode,
    NodeLayer,
};
pub use mermaid::{render_mermaid_columns, render_mermaid_tables, DEFAULT_MAX_COLUMNS};

/// Marker used as `transform` for constant projections
pub const LITERAL_TRANSFORM: &str = "LITERAL";

/// Pseudo-table receiving the columns of a plain query
pub const OUTPUT_TABLE: &str = "OUTPUT";

/// Pseudo-table for columns with no known source table
pub const UNKNOWN_SOURCE: &str = "SOURCE";

/// Lineage read from one batch of SQL
///
/// When `error` is set every other field is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageResult {
    /// Tables read, in order of first reference
    pub source_tables: Vec<String>,
    /// Table written by INSERT, CREATE TABLE AS or CREATE VIEW
    pub target_table: Option<String>,
    pub column_lineage: Vec<ColumnLineageEdge>,
    pub table_lineage: Vec<TableLineageEdge>,
    /// Common table expression names, as declared
    pub ctes: Vec<String>,
    pub error: Option<String>,
}

impl LineageResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Target table, or `OUTPUT` for a plain query
    pub fn target_or_output(&self) -> &str {
        self.target_table.as_deref().unwrap_or(OUTPUT_TABLE)
    }

    /// Uppercased table an edge reads from
    ///
    /// Unqualified columns are attributed to the first source table, or to
    /// `SOURCE` when there is none.
    pub fn source_table_of(&self, edge: &ColumnLineageEdge) -> String {
        if !edge.source_table.is_empty() {
            return edge.source_table.to_uppercase();
        }
        self.source_tables
            .first()
            .map(|t| t.to_uppercase())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
    }
}

/// Provenance of one projected column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLineageEdge {
    pub target_col: String,
    pub source_col: String,
    /// Table the source column was read from; empty when unqualified
    pub source_table: String,
    /// Rendered expression, `LITERAL`, or empty for a plain column copy
    pub transform: String,
}

impl ColumnLineageEdge {
    pub fn is_literal(&self) -> bool {
        self.transform == LITERAL_TRANSFORM
    }

    /// True when the value is computed rather than copied or constant
    pub fn has_transform(&self) -> bool {
        !self.transform.is_empty() && !self.is_literal()
    }
}

/// Table-level lineage edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableLineageEdge {
    pub from: String,
    pub to: String,
}

/// Rendering-safe identifier: uppercased, anything outside `[A-Za-z0-9_]`
/// replaced with `_`
pub fn safe_id(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_id() {
        assert_eq!(safe_id("ods_sales.amt"), "ODS_SALES_AMT");
        assert_eq!(safe_id("T_NVL(S.AMT, 0)"), "T_NVL_S_AMT__0_");
        assert_eq!(safe_id("부서"), "__");
    }

    #[test]
    fn test_failed_result_is_empty() {
        let result = LineageResult::failed("parse failed");
        assert!(!result.is_ok());
        assert!(result.source_tables.is_empty());
        assert!(result.column_lineage.is_empty());
        assert_eq!(result.target_or_output(), "OUTPUT");
    }
}
