//! Lineage extraction from parsed statements

use indexmap::IndexSet;
use sqlparser::ast::{
    visit_expressions, visit_relations, Expr, Ident, ObjectName, Query, Select, SelectItem,
    SetExpr, Statement, TableFactor, Visit, Visitor,
};
use std::collections::HashMap;
use std::ops::ControlFlow;

use super::{ColumnLineageEdge, LineageResult, TableLineageEdge, LITERAL_TRANSFORM, OUTPUT_TABLE};
use crate::dialect::SqlDialect;
use crate::error::sanitize_message;
use crate::parser::{parse, ParseOutcome};

/// Longest rendered expression kept in `transform`
const MAX_TRANSFORM_CHARS: usize = 80;

/// Extract table and column lineage from `sql`
pub fn extract_lineage(sql: &str, dialect: SqlDialect) -> LineageResult {
    extract_lineage_outcome(&parse(sql, dialect))
}

/// Extract lineage from an existing parse
pub fn extract_lineage_outcome(outcome: &ParseOutcome) -> LineageResult {
    let statements = match outcome {
        ParseOutcome::Parsed(statements) => statements,
        ParseOutcome::Failed(reason) => {
            tracing::warn!(%reason, "lineage unavailable");
            return LineageResult::failed(sanitize_message(&format!("parse failed: {reason}")));
        }
    };

    let mut builder = LineageBuilder::default();
    for stmt in statements {
        builder.add_statement(stmt);
    }
    let result = builder.finish();

    tracing::debug!(
        sources = result.source_tables.len(),
        target = result.target_or_output(),
        columns = result.column_lineage.len(),
        ctes = result.ctes.len(),
        "extracted lineage"
    );
    result
}

/// Names of every common table expression declared at any depth
pub fn collect_cte_names(statements: &[Statement]) -> Vec<String> {
    let mut collector = CteCollector::default();
    for stmt in statements {
        let _ = stmt.visit(&mut collector);
    }
    collector.names.into_iter().collect()
}

#[derive(Default)]
struct CteCollector {
    names: IndexSet<String>,
}

impl Visitor for CteCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.names.insert(cte.alias.name.value.clone());
            }
        }
        ControlFlow::Continue(())
    }
}

#[derive(Default)]
struct LineageBuilder {
    source_tables: Vec<String>,
    target_table: Option<String>,
    column_lineage: Vec<ColumnLineageEdge>,
    ctes: Vec<String>,
}

/// What a statement writes to and the query that feeds it
struct StatementShape<'a> {
    target: Option<String>,
    insert_columns: &'a [Ident],
    query: Option<&'a Query>,
}

impl LineageBuilder {
    fn add_statement(&mut self, stmt: &Statement) {
        for name in collect_cte_names(std::slice::from_ref(stmt)) {
            if !contains_ignore_case(&self.ctes, &name) {
                self.ctes.push(name);
            }
        }

        let shape = statement_shape(stmt);
        if shape.target.is_some() {
            self.target_table = shape.target;
        }

        let _ = visit_relations(stmt, |relation| {
            self.add_source(object_name_to_string(relation));
            ControlFlow::<()>::Continue(())
        });

        if let Some(select) = shape.query.and_then(|q| main_select(&q.body)) {
            self.add_projection(select, shape.insert_columns);
        }
    }

    fn add_source(&mut self, name: String) {
        let is_target = self
            .target_table
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(&name));
        if name.is_empty()
            || is_target
            || contains_ignore_case(&self.ctes, &name)
            || contains_ignore_case(&self.source_tables, &name)
        {
            return;
        }
        self.source_tables.push(name);
    }

    fn add_projection(&mut self, select: &Select, insert_columns: &[Ident]) {
        let aliases = table_aliases(select);

        for (position, item) in select.projection.iter().enumerate() {
            let (expr, alias) = match item {
                SelectItem::UnnamedExpr(expr) => (Some(expr), None),
                SelectItem::ExprWithAlias { expr, alias } => (Some(expr), Some(alias)),
                _ => (None, None),
            };

            let target_col = match (insert_columns.get(position), alias, expr) {
                (Some(column), _, _) => column.value.clone(),
                (None, Some(alias), _) => alias.value.clone(),
                (None, None, Some(expr)) => output_name(expr),
                (None, None, None) => item.to_string(),
            };

            let mut edge = match expr {
                Some(expr) => edge_for_expr(expr),
                None => ColumnLineageEdge {
                    transform: truncate(&item.to_string()),
                    ..ColumnLineageEdge::default()
                },
            };
            edge.target_col = target_col;
            if let Some(table) = aliases.get(&edge.source_table.to_uppercase()) {
                edge.source_table = table.clone();
            }
            self.column_lineage.push(edge);
        }
    }

    fn finish(mut self) -> LineageResult {
        // a later statement in the batch may write a table read earlier
        if let Some(target) = &self.target_table {
            self.source_tables.retain(|s| !s.eq_ignore_ascii_case(target));
        }

        let target = self
            .target_table
            .clone()
            .unwrap_or_else(|| OUTPUT_TABLE.to_string());
        let table_lineage = self
            .source_tables
            .iter()
            .map(|source| TableLineageEdge {
                from: source.clone(),
                to: target.clone(),
            })
            .collect();

        LineageResult {
            source_tables: self.source_tables,
            target_table: self.target_table,
            column_lineage: self.column_lineage,
            table_lineage,
            ctes: self.ctes,
            error: None,
        }
    }
}

fn statement_shape(stmt: &Statement) -> StatementShape<'_> {
    match stmt {
        Statement::Insert(insert) => StatementShape {
            target: Some(object_name_to_string(&insert.table_name)),
            insert_columns: &insert.columns,
            query: insert.source.as_deref(),
        },
        Statement::CreateTable(create) => StatementShape {
            target: Some(object_name_to_string(&create.name)),
            insert_columns: &[],
            query: create.query.as_deref(),
        },
        Statement::CreateView { name, query, .. } => StatementShape {
            target: Some(object_name_to_string(name)),
            insert_columns: &[],
            query: Some(query.as_ref()),
        },
        Statement::Query(query) => match query.body.as_ref() {
            // WITH ... INSERT INTO ... SELECT
            SetExpr::Insert(inner) => statement_shape(inner),
            _ => StatementShape {
                target: None,
                insert_columns: &[],
                query: Some(query.as_ref()),
            },
        },
        _ => StatementShape {
            target: None,
            insert_columns: &[],
            query: None,
        },
    }
}

/// Top-level SELECT of a query body; the leftmost branch of a set operation
fn main_select(body: &SetExpr) -> Option<&Select> {
    match body {
        SetExpr::Select(select) => Some(select.as_ref()),
        SetExpr::Query(query) => main_select(&query.body),
        SetExpr::SetOperation { left, .. } => main_select(left),
        _ => None,
    }
}

/// Uppercased alias -> table name for the FROM and JOIN list of `select`
fn table_aliases(select: &Select) -> HashMap<String, String> {
    let factors = select
        .from
        .iter()
        .flat_map(|twj| std::iter::once(&twj.relation).chain(twj.joins.iter().map(|j| &j.relation)));

    let mut aliases = HashMap::new();
    for factor in factors {
        if let TableFactor::Table {
            name,
            alias: Some(alias),
            ..
        } = factor
        {
            aliases.insert(alias.name.value.to_uppercase(), object_name_to_string(name));
        }
    }
    aliases
}

fn edge_for_expr(expr: &Expr) -> ColumnLineageEdge {
    if let Some((table, column)) = column_reference(expr) {
        return ColumnLineageEdge {
            source_col: column,
            source_table: table,
            ..ColumnLineageEdge::default()
        };
    }

    match expr {
        Expr::Value(value) => ColumnLineageEdge {
            source_col: value.to_string(),
            transform: LITERAL_TRANSFORM.to_string(),
            ..ColumnLineageEdge::default()
        },
        expr if is_call_like(expr) => {
            // the first column reached depth-first stands for the whole call
            let (source_table, source_col) = first_column(expr).unwrap_or_default();
            ColumnLineageEdge {
                source_col,
                source_table,
                transform: truncate(&expr.to_string()),
                ..ColumnLineageEdge::default()
            }
        }
        _ => ColumnLineageEdge {
            transform: truncate(&expr.to_string()),
            ..ColumnLineageEdge::default()
        },
    }
}

/// `(qualifier, column)` for a bare or qualified column reference
fn column_reference(expr: &Expr) -> Option<(String, String)> {
    match expr {
        Expr::Identifier(ident) => Some((String::new(), ident.value.clone())),
        Expr::CompoundIdentifier(parts) => {
            let (column, qualifier) = parts.split_last()?;
            let qualifier = qualifier
                .iter()
                .map(|p| p.value.as_str())
                .collect::<Vec<_>>()
                .join(".");
            Some((qualifier, column.value.clone()))
        }
        _ => None,
    }
}

fn first_column(expr: &Expr) -> Option<(String, String)> {
    let found = visit_expressions(expr, |e| match column_reference(e) {
        Some(reference) => ControlFlow::Break(reference),
        None => ControlFlow::Continue(()),
    });
    match found {
        ControlFlow::Break(reference) => Some(reference),
        ControlFlow::Continue(()) => None,
    }
}

/// Function calls and operators
fn is_call_like(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Function(_)
            | Expr::BinaryOp { .. }
            | Expr::UnaryOp { .. }
            | Expr::Cast { .. }
            | Expr::Case { .. }
            | Expr::Nested(_)
            | Expr::Extract { .. }
            | Expr::Substring { .. }
            | Expr::Trim { .. }
            | Expr::Ceil { .. }
            | Expr::Floor { .. }
            | Expr::Position { .. }
            | Expr::AtTimeZone { .. }
            | Expr::Between { .. }
            | Expr::InList { .. }
            | Expr::Like { .. }
            | Expr::ILike { .. }
            | Expr::IsNull(_)
            | Expr::IsNotNull(_)
    )
}

/// Name a projected expression gets without an alias
fn output_name(expr: &Expr) -> String {
    match column_reference(expr) {
        Some((_, column)) => column,
        None => expr.to_string(),
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TRANSFORM_CHARS).collect()
}

fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn contains_ignore_case(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}
