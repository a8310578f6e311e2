//! Identifier extraction for schema validation

use indexmap::IndexSet;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::dialect::DialectFamily;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").expect("identifier pattern is valid")
});
static SELECT_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bAS\s+([A-Za-z_][A-Za-z0-9_]*)\b").expect("alias pattern is valid")
});
static CTE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bWITH|,)\s*(?:RECURSIVE\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*(?:\([^)]*\)\s*)?AS\s*\(")
        .expect("cte pattern is valid")
});

/// Keywords and functions shared by every dialect
const COMMON_STOPWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "JOIN", "LEFT", "RIGHT", "FULL", "INNER", "OUTER", "CROSS",
    "ON", "USING", "GROUP", "BY", "HAVING", "ORDER", "FETCH", "FIRST", "NEXT", "ROW", "ROWS",
    "ONLY", "AS", "AND", "OR", "NOT", "IN", "EXISTS", "CASE", "WHEN", "THEN", "ELSE", "END",
    "IS", "NULL", "TRUE", "FALSE", "UNION", "ALL", "INTERSECT", "EXCEPT", "ANY", "SOME",
    "COUNT", "SUM", "AVG", "MIN", "MAX", "LAST", "DESC", "ASC", "WITH", "RECURSIVE",
    "DISTINCT", "LIKE", "BETWEEN", "COALESCE", "ROUND", "CAST", "NULLIF", "ABS", "UPPER",
    "LOWER", "TRIM", "LENGTH", "REPLACE", "OVER", "PARTITION", "NULLS", "INTERVAL", "DATE",
    "TIMESTAMP", "CURRENT_DATE", "CURRENT_TIMESTAMP", "EXTRACT", "YEAR", "MONTH", "DAY",
    "ROW_NUMBER", "RANK", "DENSE_RANK", "LAG", "LEAD", "VARCHAR", "CHAR", "INTEGER", "NUMBER",
    "DECIMAL",
];

/// Oracle-only keywords and functions
const ORACLE_STOPWORDS: &[&str] = &[
    "TRUNC", "MONTHS_BETWEEN", "SYSDATE", "TO_DATE", "RPAD", "LPAD", "SUBSTR", "NVL", "NVL2",
    "ROWNUM", "DECODE", "TO_CHAR", "TO_NUMBER", "ADD_MONTHS", "INSTR", "DUAL", "VARCHAR2",
    "SYSTIMESTAMP", "LISTAGG", "WITHIN",
];

/// MariaDB/MySQL and PostgreSQL keywords and functions
const LIMIT_STOPWORDS: &[&str] = &[
    "LIMIT", "OFFSET", "IFNULL", "NOW", "DATE_FORMAT", "STR_TO_DATE", "CONCAT", "CURDATE",
    "CURTIME", "DATEDIFF", "DATE_ADD", "DATE_SUB", "SUBSTRING", "DATE_TRUNC", "TO_CHAR",
    "TO_DATE", "STRING_AGG", "GROUP_CONCAT", "ILIKE",
];

/// Uppercased stopword set for a dialect family plus configured extras
pub fn stopwords(family: DialectFamily, extra: &[String]) -> HashSet<String> {
    let specific = match family {
        DialectFamily::Oracle => ORACLE_STOPWORDS,
        DialectFamily::Limit => LIMIT_STOPWORDS,
    };
    COMMON_STOPWORDS
        .iter()
        .chain(specific)
        .map(|w| w.to_string())
        .chain(extra.iter().map(|w| w.trim().to_uppercase()))
        .collect()
}

/// Replace the contents of single-quoted literals with spaces
///
/// Keeps byte offsets stable so later matches still line up with the text.
pub fn blank_string_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_literal = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            if in_literal && chars.peek() == Some(&'\'') {
                // doubled quote inside a literal
                chars.next();
                out.push_str("  ");
                continue;
            }
            in_literal = !in_literal;
            out.push(c);
        } else if in_literal {
            for _ in 0..c.len_utf8() {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }

    out
}

/// Output aliases defined with `AS name`, uppercased
pub fn extract_select_aliases(sql: &str) -> HashSet<String> {
    SELECT_ALIAS
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

/// Names declared as common table expressions, uppercased
pub fn extract_cte_names(sql: &str) -> HashSet<String> {
    CTE_NAME
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect()
}

/// Distinct identifier-shaped tokens in order of first appearance
///
/// Tokens in `stopwords` (compared uppercased) are dropped, as is anything
/// inside a string literal. A trailing dot is not part of the token.
pub fn extract_identifiers(sql: &str, stopwords: &HashSet<String>) -> IndexSet<String> {
    let text = blank_string_literals(sql);
    IDENTIFIER
        .find_iter(&text)
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|token| !token.is_empty())
        .filter(|token| !stopwords.contains(&token.to_uppercase()))
        .map(str::to_string)
        .collect()
}

/// Maximal runs of word characters, for whole-word matching
pub fn word_tokens(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
}

/// Whole-word, case-insensitive containment test
pub fn mentions_word(sql: &str, word: &str) -> bool {
    word_tokens(sql).any(|t| t.eq_ignore_ascii_case(word))
}
