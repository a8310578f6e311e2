//! Policy validator - runs every policy check and collects the findings

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use super::identifiers::{
    extract_cte_names, extract_identifiers, extract_select_aliases, mentions_word, stopwords,
    word_tokens,
};
use super::normalize::normalize_sql;
use super::PolicyConfig;
use crate::classifier::{classify_outcome, StatementClass};
use crate::dialect::SqlDialect;
use crate::error::{Severity, Violation, ViolationKind};
use crate::lineage::collect_cte_names;
use crate::parser::{parse, ParseOutcome};
use crate::schema::Catalog;

static WILDCARD_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SELECT\s*\*").expect("wildcard pattern is valid"));
static FETCH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFETCH\s+(?:FIRST|NEXT)\s+(\d+)\s+ROWS?\s+ONLY\b")
        .expect("fetch pattern is valid")
});
static ROWNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bROWNUM\s*<=\s*(\d+)").expect("rownum pattern is valid"));
static LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").expect("limit pattern is valid"));

/// Outcome of policy validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// True when no blocking error was found
    pub passed: bool,
    /// Blocking messages, in check order
    pub errors: Vec<String>,
    /// Advisory messages
    pub warnings: Vec<String>,
    /// Structured form of every finding above
    pub violations: Vec<Violation>,
}

impl PolicyVerdict {
    fn from_violations(violations: Vec<Violation>) -> Self {
        let errors: Vec<String> = violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .map(|v| v.message.clone())
            .collect();
        let warnings = violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .map(|v| v.message.clone())
            .collect();

        Self {
            passed: errors.is_empty(),
            errors,
            warnings,
            violations,
        }
    }

    /// Findings of a single kind
    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations_of(kind).next().is_some()
    }
}

/// Validates candidate SQL against a catalog and a policy
pub struct PolicyValidator<'a> {
    catalog: &'a Catalog,
    config: &'a PolicyConfig,
    violations: Vec<Violation>,
}

impl<'a> PolicyValidator<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a PolicyConfig) -> Self {
        Self {
            catalog,
            config,
            violations: Vec::new(),
        }
    }

    /// Normalize, parse and validate `sql`
    pub fn validate(&mut self, sql: &str, dialect: SqlDialect) -> PolicyVerdict {
        let normalized = normalize_sql(sql);
        let outcome = parse(&normalized, dialect);
        self.validate_parsed(&normalized, dialect, &outcome)
    }

    /// Validate text that has already been normalized and parsed
    pub fn validate_parsed(
        &mut self,
        normalized: &str,
        dialect: SqlDialect,
        outcome: &ParseOutcome,
    ) -> PolicyVerdict {
        self.violations.clear();

        if normalized.is_empty() {
            self.violations.push(Violation::error(
                ViolationKind::EmptyStatement,
                "empty SQL statement",
            ));
            return self.finish();
        }

        let denied = self.check_deny_keywords(normalized);
        self.check_wildcard(normalized);
        self.check_row_limit(normalized, dialect);
        self.check_pii(normalized);
        self.check_identifiers(normalized, dialect, outcome);

        if let Some(reason) = outcome.failure() {
            self.violations.push(Violation::warning(
                ViolationKind::Unparseable,
                format!("statement could not be parsed ({reason}); only textual checks applied"),
            ));
        }

        let class = classify_outcome(normalized, outcome);
        if !denied && class != StatementClass::Select {
            self.violations.push(Violation::warning(
                ViolationKind::NotReadOnly,
                format!("statement is classified as {class}, not a read-only query"),
            ));
        }

        self.finish()
    }

    fn finish(&mut self) -> PolicyVerdict {
        let verdict = PolicyVerdict::from_violations(std::mem::take(&mut self.violations));
        tracing::debug!(
            passed = verdict.passed,
            errors = verdict.errors.len(),
            warnings = verdict.warnings.len(),
            "policy verdict"
        );
        verdict
    }

    /// Returns true when a denied keyword was found
    fn check_deny_keywords(&mut self, sql: &str) -> bool {
        let denied: HashSet<String> = self
            .config
            .deny_keywords
            .iter()
            .map(|k| k.trim().to_uppercase())
            .collect();

        let mut found: Vec<String> = Vec::new();
        for token in word_tokens(sql) {
            let upper = token.to_uppercase();
            if denied.contains(&upper) && !found.contains(&upper) {
                found.push(upper);
            }
        }

        if found.is_empty() {
            return false;
        }
        self.violations.push(
            Violation::error(
                ViolationKind::DenyKeyword,
                format!("statement contains denied keyword(s): {}", found.join(", ")),
            )
            .with_help("only read-only SELECT queries are accepted"),
        );
        true
    }

    fn check_wildcard(&mut self, sql: &str) {
        if self.config.ban_wildcard_select && WILDCARD_SELECT.is_match(sql) {
            self.violations.push(
                Violation::error(ViolationKind::WildcardSelect, "SELECT * is not allowed")
                    .with_help("list the required columns explicitly"),
            );
        }
    }

    fn check_row_limit(&mut self, sql: &str, dialect: SqlDialect) {
        let syntax = self.config.row_limit_for(dialect);
        let max_rows = self.config.max_rows;

        let has_oracle = FETCH_FIRST.is_match(sql) || ROWNUM.is_match(sql);
        let has_limit = LIMIT.is_match(sql);
        let satisfied =
            (syntax.accepts_oracle() && has_oracle) || (syntax.accepts_limit() && has_limit);

        if !satisfied {
            self.violations.push(
                Violation::error(
                    ViolationKind::MissingRowLimit,
                    format!("missing row limit; add {}", syntax.hint(max_rows)),
                )
                .with_help(format!("results are capped at {max_rows} rows")),
            );
            return;
        }

        for (clause, pattern) in [
            ("FETCH FIRST", &*FETCH_FIRST),
            ("ROWNUM", &*ROWNUM),
            ("LIMIT", &*LIMIT),
        ] {
            for caps in pattern.captures_iter(sql) {
                let Some(digits) = caps.get(1) else { continue };
                // a bound too large for u64 is over any ceiling
                let exceeded = digits
                    .as_str()
                    .parse::<u64>()
                    .map_or(true, |n| n > max_rows);
                if exceeded {
                    self.violations.push(Violation::error(
                        ViolationKind::RowLimitExceeded,
                        format!(
                            "{clause} row limit {} exceeds the maximum of {max_rows}",
                            digits.as_str()
                        ),
                    ));
                }
            }
        }
    }

    fn check_pii(&mut self, sql: &str) {
        for entry in &self.config.pii_deny_columns {
            let qualified = entry.trim().to_uppercase();
            let column = qualified.rsplit('.').next().unwrap_or(qualified.as_str());
            if column.is_empty() {
                continue;
            }
            if mentions_word(sql, column) {
                let mut violation = Violation::error(
                    ViolationKind::PiiReference,
                    format!("PII column {qualified} must not be referenced"),
                );
                if !self.config.pii_mask_expression.is_empty() {
                    violation = violation.with_help(format!(
                        "use the masked expression instead: {}",
                        self.config.pii_mask_expression
                    ));
                }
                self.violations.push(violation);
            }
        }
    }

    fn check_identifiers(&mut self, sql: &str, dialect: SqlDialect, outcome: &ParseOutcome) {
        let mut skip = stopwords(dialect.family(), &self.config.extra_stopwords);
        // already reported by the deny-keyword check
        skip.extend(self.config.deny_keywords.iter().map(|k| k.trim().to_uppercase()));

        let mut known: HashSet<String> = self
            .config
            .allowed_aliases
            .iter()
            .map(|a| a.trim().to_uppercase())
            .collect();
        known.extend(extract_select_aliases(sql));
        known.extend(extract_cte_names(sql));
        if let Some(statements) = outcome.statements() {
            known.extend(collect_cte_names(statements).iter().map(|n| n.to_uppercase()));
        }

        for token in extract_identifiers(sql, &skip) {
            let upper = token.to_uppercase();
            if known.contains(&upper) || self.is_catalog_identifier(&upper) {
                continue;
            }

            let mut violation = Violation::error(
                ViolationKind::UnknownIdentifier,
                format!("unknown identifier: {token}"),
            );
            if let Some(suggestion) = self.catalog.similar_identifier(&upper) {
                violation = violation.with_help(format!("did you mean '{suggestion}'?"));
            }
            self.violations.push(violation);
        }
    }

    fn is_catalog_identifier(&self, ident: &str) -> bool {
        if self.catalog.has_table(ident) || self.catalog.has_column(ident) {
            return true;
        }
        // alias.column: the column part alone is enough
        match ident.rsplit_once('.') {
            Some((_, column)) => self.catalog.has_column(column),
            None => false,
        }
    }
}

/// Validate `sql` against `catalog` under `config`
pub fn validate(
    sql: &str,
    dialect: SqlDialect,
    catalog: &Catalog,
    config: &PolicyConfig,
) -> PolicyVerdict {
    PolicyValidator::new(catalog, config).validate(sql, dialect)
}
