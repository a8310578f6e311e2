//! Statement classifier - decides whether SQL is safe to run unattended

mod fallback;

use serde::{Deserialize, Serialize};
use sqlparser::ast::{visit_statements, Query, SetExpr, Statement};
use std::ops::ControlFlow;

use crate::dialect::SqlDialect;
use crate::parser::{parse, ParseOutcome};

pub use fallback::{classify_by_prefix, contains_mutation_keyword};

/// Risk class of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementClass {
    Select,
    Dml,
    Ddl,
    Unknown,
}

impl StatementClass {
    pub fn is_mutation(&self) -> bool {
        matches!(self, StatementClass::Dml | StatementClass::Ddl)
    }

    /// Fold per-statement classes of a batch into one class
    ///
    /// A batch is `Select` only when every statement is. Otherwise the first
    /// mutating class wins, then `Unknown`.
    pub fn combine(classes: impl IntoIterator<Item = StatementClass>) -> StatementClass {
        let mut combined = StatementClass::Select;
        let mut seen = false;
        for class in classes {
            seen = true;
            match class {
                StatementClass::Select => {}
                StatementClass::Dml | StatementClass::Ddl => return class,
                StatementClass::Unknown => combined = StatementClass::Unknown,
            }
        }
        if seen {
            combined
        } else {
            StatementClass::Unknown
        }
    }
}

impl std::fmt::Display for StatementClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementClass::Select => write!(f, "SELECT"),
            StatementClass::Dml => write!(f, "DML"),
            StatementClass::Ddl => write!(f, "DDL"),
            StatementClass::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify SQL text by the root node of each parsed statement
pub fn classify(sql: &str, dialect: SqlDialect) -> StatementClass {
    classify_outcome(sql, &parse(sql, dialect))
}

/// Classify from an already computed parse result
///
/// `sql` is only read when the parse failed.
pub fn classify_outcome(sql: &str, outcome: &ParseOutcome) -> StatementClass {
    match outcome {
        ParseOutcome::Parsed(statements) => {
            StatementClass::combine(statements.iter().map(classify_statement))
        }
        ParseOutcome::Failed(reason) => {
            let class = classify_by_prefix(sql);
            tracing::warn!(%reason, %class, "classifying unparseable SQL by keyword prefix");
            class
        }
    }
}

/// True when any statement node at any depth mutates data or schema
pub fn contains_nested_mutation(sql: &str, dialect: SqlDialect) -> bool {
    contains_nested_mutation_outcome(sql, &parse(sql, dialect))
}

/// Nested-mutation check from an already computed parse result
///
/// An unparseable statement is scanned for mutation keywords instead; a
/// keyword anywhere in the comment-stripped text counts as a mutation.
pub fn contains_nested_mutation_outcome(sql: &str, outcome: &ParseOutcome) -> bool {
    match outcome {
        ParseOutcome::Parsed(statements) => statements.iter().any(statement_has_mutation),
        ParseOutcome::Failed(reason) => {
            let found = contains_mutation_keyword(sql);
            tracing::warn!(%reason, found, "scanning unparseable SQL for mutation keywords");
            found
        }
    }
}

/// The execution gate: a plain read with no mutation anywhere in the tree
pub fn is_safe_to_autorun(sql: &str, dialect: SqlDialect) -> bool {
    is_safe_outcome(sql, &parse(sql, dialect))
}

pub fn is_safe_outcome(sql: &str, outcome: &ParseOutcome) -> bool {
    classify_outcome(sql, outcome) == StatementClass::Select
        && !contains_nested_mutation_outcome(sql, outcome)
}

/// Class of a single statement, judged by its root node
pub fn classify_statement(stmt: &Statement) -> StatementClass {
    match stmt {
        Statement::Query(query) => classify_query(query),

        Statement::Insert { .. }
        | Statement::Update { .. }
        | Statement::Delete { .. }
        | Statement::Merge { .. } => StatementClass::Dml,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateFunction { .. }
        | Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterRole { .. }
        | Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::Truncate { .. } => StatementClass::Ddl,

        _ => StatementClass::Unknown,
    }
}

fn classify_query(query: &Query) -> StatementClass {
    classify_set_expr(&query.body)
}

fn classify_set_expr(body: &SetExpr) -> StatementClass {
    match body {
        // SELECT ... INTO creates a table
        SetExpr::Select(select) if select.into.is_some() => StatementClass::Ddl,
        SetExpr::Select(_) => StatementClass::Select,
        SetExpr::Query(inner) => classify_query(inner),
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
        // UNION, INTERSECT and EXCEPT are not a plain read
        _ => StatementClass::Unknown,
    }
}

fn statement_has_mutation(stmt: &Statement) -> bool {
    visit_statements(stmt, |node| {
        if classify_statement(node).is_mutation() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .is_break()
}
