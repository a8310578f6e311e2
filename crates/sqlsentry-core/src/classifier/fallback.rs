//! Keyword heuristics used when the parser gives up
//!
//! Both functions lean towards the answer that blocks execution.

use regex::Regex;
use std::sync::LazyLock;

use super::StatementClass;
use crate::parser::split_sql_statements;
use crate::policy::normalize_sql;

static MUTATION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|MERGE|CREATE|ALTER|DROP|TRUNCATE)\b")
        .expect("mutation keyword pattern is valid")
});

/// Classify by the leading keyword of each statement
pub fn classify_by_prefix(sql: &str) -> StatementClass {
    let normalized = normalize_sql(sql);
    StatementClass::combine(split_sql_statements(&normalized).into_iter().map(prefix_class))
}

fn prefix_class(stmt: &str) -> StatementClass {
    let upper = stmt.trim().trim_start_matches('(').trim_start().to_uppercase();

    if starts_with_any(&upper, &["SELECT", "WITH"]) {
        StatementClass::Select
    } else if starts_with_any(&upper, &["INSERT", "UPDATE", "DELETE", "MERGE"]) {
        StatementClass::Dml
    } else if starts_with_any(&upper, &["CREATE", "ALTER", "DROP", "TRUNCATE"]) {
        StatementClass::Ddl
    } else {
        StatementClass::Unknown
    }
}

fn starts_with_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.starts_with(*k))
}

/// Whole-word scan for any mutating keyword outside comments
pub fn contains_mutation_keyword(sql: &str) -> bool {
    MUTATION_KEYWORDS.is_match(&normalize_sql(sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_classes() {
        assert_eq!(classify_by_prefix("select a from"), StatementClass::Select);
        assert_eq!(classify_by_prefix("  (SELECT a"), StatementClass::Select);
        assert_eq!(classify_by_prefix("with x as"), StatementClass::Select);
        assert_eq!(classify_by_prefix("merge into t"), StatementClass::Dml);
        assert_eq!(classify_by_prefix("truncate t"), StatementClass::Ddl);
        assert_eq!(classify_by_prefix("explain t"), StatementClass::Unknown);
        assert_eq!(classify_by_prefix(""), StatementClass::Unknown);
    }

    #[test]
    fn test_prefix_ignores_leading_comments() {
        assert_eq!(
            classify_by_prefix("/* harmless */ DELETE FROM t"),
            StatementClass::Dml
        );
        assert_eq!(
            classify_by_prefix("-- note\nSELECT a"),
            StatementClass::Select
        );
    }

    #[test]
    fn test_prefix_batch_escalates() {
        assert_eq!(
            classify_by_prefix("SELECT a FROM t; DROP TABLE t"),
            StatementClass::Ddl
        );
    }

    #[test]
    fn test_mutation_keyword_scan() {
        assert!(contains_mutation_keyword("SELECT * FROM (delete from t) x"));
        assert!(!contains_mutation_keyword("SELECT updated_at FROM t"));
        assert!(!contains_mutation_keyword("SELECT a FROM t -- drop later"));
    }
}
