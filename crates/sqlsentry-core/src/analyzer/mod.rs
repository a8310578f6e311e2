//! One-call analysis: classification, policy and lineage from a single parse

use serde::{Deserialize, Serialize};

use crate::classifier::{classify_outcome, contains_nested_mutation_outcome, StatementClass};
use crate::dialect::SqlDialect;
use crate::lineage::{extract_lineage_outcome, LineageResult};
use crate::parser::parse;
use crate::policy::{normalize_sql, PolicyConfig, PolicyValidator, PolicyVerdict};
use crate::schema::Catalog;

/// Everything known about one candidate statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub class: StatementClass,
    pub nested_mutation: bool,
    /// The only flag that permits unattended execution
    pub safe_to_autorun: bool,
    pub verdict: PolicyVerdict,
    pub lineage: LineageResult,
}

impl AnalysisReport {
    /// Safe to run without review and free of policy errors
    pub fn approved(&self) -> bool {
        self.safe_to_autorun && self.verdict.passed
    }
}

/// SQL analyzer - runs every check against a catalog and policy
pub struct Analyzer<'a> {
    catalog: &'a Catalog,
    config: &'a PolicyConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a PolicyConfig) -> Self {
        Self { catalog, config }
    }

    /// Analyze `sql` written for `dialect`
    pub fn analyze(&self, sql: &str, dialect: SqlDialect) -> AnalysisReport {
        let normalized = normalize_sql(sql);
        let outcome = parse(&normalized, dialect);

        let class = classify_outcome(&normalized, &outcome);
        let nested_mutation = contains_nested_mutation_outcome(&normalized, &outcome);
        let safe_to_autorun = class == StatementClass::Select && !nested_mutation;

        let verdict = PolicyValidator::new(self.catalog, self.config).validate_parsed(
            &normalized,
            dialect,
            &outcome,
        );
        let lineage = extract_lineage_outcome(&outcome);

        tracing::debug!(
            %dialect,
            %class,
            nested_mutation,
            safe_to_autorun,
            passed = verdict.passed,
            "analyzed statement"
        );

        AnalysisReport {
            class,
            nested_mutation,
            safe_to_autorun,
            verdict,
            lineage,
        }
    }

    /// Analyze with the dialect named in the policy
    pub fn analyze_default(&self, sql: &str) -> AnalysisReport {
        self.analyze(sql, self.config.dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    fn setup_catalog() -> Catalog {
        let schema_sql = r#"
            CREATE TABLE employee (
                emp_id NUMBER PRIMARY KEY,
                emp_name VARCHAR(100) NOT NULL,
                dept_id NUMBER,
                rrn_front VARCHAR(6),
                rrn_back VARCHAR(7)
            );

            CREATE TABLE department (
                dept_id NUMBER PRIMARY KEY,
                dept_name VARCHAR(100)
            );
        "#;

        let mut builder = SchemaBuilder::new(SqlDialect::Oracle);
        builder.parse(schema_sql).unwrap();
        builder.build()
    }

    #[test]
    fn test_valid_select() {
        let catalog = setup_catalog();
        let config = PolicyConfig::default();
        let analyzer = Analyzer::new(&catalog, &config);

        let report = analyzer.analyze(
            "SELECT E.EMP_ID, D.DEPT_NAME FROM EMPLOYEE E JOIN DEPARTMENT D ON E.DEPT_ID = D.DEPT_ID \
             FETCH FIRST 100 ROWS ONLY",
            SqlDialect::Oracle,
        );
        assert_eq!(report.class, StatementClass::Select);
        assert!(report.safe_to_autorun);
        assert!(report.verdict.passed, "Expected no errors: {:?}", report.verdict.errors);
        assert!(report.approved());
        assert_eq!(report.lineage.source_tables, vec!["EMPLOYEE", "DEPARTMENT"]);
    }

    #[test]
    fn test_fenced_input() {
        let catalog = setup_catalog();
        let config = PolicyConfig::default();
        let analyzer = Analyzer::new(&catalog, &config);

        let report = analyzer.analyze_default(
            "```sql\nSELECT EMP_NAME FROM EMPLOYEE -- newest first\nFETCH FIRST 5 ROWS ONLY\n```",
        );
        assert!(report.approved(), "{:?}", report.verdict.errors);
        assert!(report.lineage.is_ok());
    }

    #[test]
    fn test_dml_is_never_safe() {
        let catalog = setup_catalog();
        let config = PolicyConfig::default();
        let analyzer = Analyzer::new(&catalog, &config);

        let report = analyzer.analyze("DELETE FROM EMPLOYEE WHERE EMP_ID = 1", SqlDialect::Oracle);
        assert_eq!(report.class, StatementClass::Dml);
        assert!(report.nested_mutation);
        assert!(!report.safe_to_autorun);
        assert!(!report.verdict.passed);
    }

    #[test]
    fn test_unparseable_select_is_not_safe() {
        let catalog = setup_catalog();
        let config = PolicyConfig::default();
        let analyzer = Analyzer::new(&catalog, &config);

        let report = analyzer.analyze(
            "SELECT EMP_ID FROM (DELETE FROM EMPLOYEE RETURNING EMP_ID) x",
            SqlDialect::Oracle,
        );
        assert!(!report.safe_to_autorun);
        assert!(!report.approved());
    }
}
