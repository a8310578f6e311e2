//! Mermaid flowchart rendering of lineage results

use indexmap::{IndexMap, IndexSet};

use super::{safe_id, LineageResult};

/// Column edges drawn by default
pub const DEFAULT_MAX_COLUMNS: usize = 20;

const MAX_COLUMNS_PER_TABLE: usize = 10;
const MAX_CTE_SUBGRAPHS: usize = 3;
const MAX_TRANSFORM_LABEL: usize = 30;

fn escape_label(label: &str) -> String {
    label.replace('"', "'").replace(['\n', '\r'], " ")
}

/// Column-level `flowchart LR` with one subgraph per table
///
/// Only the first `max_cols` column edges are drawn. Computed columns get a
/// diamond node carrying the shortened transform.
pub fn render_mermaid_columns(lineage: &LineageResult, max_cols: usize) -> String {
    let mut lines = vec!["flowchart LR".to_string()];
    let target_table = lineage.target_or_output();
    let edges: Vec<_> = lineage.column_lineage.iter().take(max_cols).collect();

    let mut source_columns: IndexMap<String, IndexSet<&str>> = IndexMap::new();
    for edge in &edges {
        source_columns
            .entry(lineage.source_table_of(edge))
            .or_default()
            .insert(edge.source_col.as_str());
    }

    for table in &lineage.source_tables {
        lines.push(format!("    subgraph {}[{}]", safe_id(table), escape_label(table)));
        if let Some(columns) = source_columns.get(&table.to_uppercase()) {
            for column in columns.iter().take(MAX_COLUMNS_PER_TABLE) {
                lines.push(format!(
                    "        {}[\"{}\"]",
                    safe_id(&format!("{table}_{column}")),
                    escape_label(column)
                ));
            }
        }
        lines.push("    end".to_string());
    }

    for cte in lineage.ctes.iter().take(MAX_CTE_SUBGRAPHS) {
        let id = safe_id(cte);
        lines.push(format!("    subgraph {id}[CTE: {}]", escape_label(cte)));
        lines.push(format!("        {id}_data[(\"aggregate / transform\")]"));
        lines.push("    end".to_string());
    }

    let target_columns: IndexSet<&str> = edges.iter().map(|e| e.target_col.as_str()).collect();
    lines.push(format!(
        "    subgraph {}[{}]",
        safe_id(target_table),
        escape_label(target_table)
    ));
    for column in target_columns.iter().take(MAX_COLUMNS_PER_TABLE) {
        lines.push(format!(
            "        {}[\"{}\"]",
            safe_id(&format!("{target_table}_{column}")),
            escape_label(column)
        ));
    }
    lines.push("    end".to_string());

    for edge in &edges {
        let source_table = lineage.source_table_of(edge);
        let source_id = safe_id(&format!("{source_table}_{}", edge.source_col));
        let target_id = safe_id(&format!("{target_table}_{}", edge.target_col));

        if edge.has_transform() {
            let mid_id = safe_id(&format!(
                "T_{source_table}_{}_{}",
                edge.source_col, edge.target_col
            ));
            let short: String = edge.transform.chars().take(MAX_TRANSFORM_LABEL).collect();
            lines.push(format!("    {mid_id}{{\"{}\"}}", escape_label(&short)));
            lines.push(format!("    {source_id} --> {mid_id}"));
            lines.push(format!("    {mid_id} --> {target_id}"));
        } else {
            lines.push(format!("    {source_id} --> {target_id}"));
        }
    }

    lines.join("\n")
}

/// Table-level `flowchart LR`; CTEs are drawn as standalone diamonds
pub fn render_mermaid_tables(lineage: &LineageResult) -> String {
    let mut lines = vec!["flowchart LR".to_string()];
    let mut seen: IndexSet<String> = IndexSet::new();

    for edge in &lineage.table_lineage {
        let from_id = safe_id(&edge.from);
        let to_id = safe_id(&edge.to);
        if seen.insert(from_id.clone()) {
            lines.push(format!("    {from_id}[\"{}\"]", escape_label(&edge.from)));
        }
        if seen.insert(to_id.clone()) {
            lines.push(format!("    {to_id}[(\"{}\")]", escape_label(&edge.to)));
        }
        lines.push(format!("    {from_id} --> {to_id}"));
    }

    for cte in &lineage.ctes {
        let id = safe_id(cte);
        lines.push(format!("    {id}{{\"{} (CTE)\"}}", escape_label(cte)));
    }

    lines.join("\n")
}
