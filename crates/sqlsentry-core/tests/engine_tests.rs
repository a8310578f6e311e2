// Integration tests for the classification, policy and lineage pipeline
use pretty_assertions::assert_eq;
use sqlsentry_core::analyzer::Analyzer;
use sqlsentry_core::classifier::{classify, contains_nested_mutation, is_safe_to_autorun};
use sqlsentry_core::dialect::SqlDialect;
use sqlsentry_core::error::ViolationKind;
use sqlsentry_core::lineage::{
    build_graph, extract_lineage, render_mermaid_tables, ImpactDirection,
};
use sqlsentry_core::policy::{validate, PolicyConfig};
use sqlsentry_core::schema::Catalog;
use sqlsentry_core::StatementClass;

const SALES_ETL: &str = "INSERT INTO DW_SALES (SALE_ID, SALE_AMT) \
                         SELECT S.SALE_ID, NVL(S.AMT,0) FROM ODS_SALES S";

fn hr_catalog() -> Catalog {
    Catalog::from_json_str(
        r#"{
            "EMPLOYEE": {
                "columns": [
                    {"name": "EMP_ID", "type": "NUMBER"},
                    {"name": "EMP_NAME", "type": "VARCHAR2(100)"},
                    {"name": "DEPT_ID", "type": "NUMBER"},
                    {"name": "RRN_FRONT", "type": "VARCHAR2(6)"},
                    {"name": "RRN_BACK", "type": "VARCHAR2(7)"}
                ],
                "primaryKey": ["EMP_ID"],
                "foreignKeys": [{"column": "DEPT_ID", "refTable": "DEPARTMENT", "refColumn": "DEPT_ID"}]
            },
            "DEPARTMENT": {
                "columns": [{"name": "DEPT_ID", "type": "NUMBER"}, {"name": "DEPT_NAME", "type": "VARCHAR2(100)"}],
                "primaryKey": ["DEPT_ID"],
                "foreignKeys": []
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn test_classify_is_total() {
    let inputs = [
        "",
        "   ",
        "SELECT",
        "))((",
        "GRANT SELECT ON EMPLOYEE TO analyst",
        "SELECT 1 FROM DUAL; DROP TABLE EMPLOYEE",
        "\u{0}\u{1}garbage",
    ];
    for sql in inputs {
        let class = classify(sql, SqlDialect::Oracle);
        assert!(matches!(
            class,
            StatementClass::Select | StatementClass::Dml | StatementClass::Ddl | StatementClass::Unknown
        ));
    }
    assert_eq!(
        classify("SELECT 1 FROM DUAL; DROP TABLE EMPLOYEE", SqlDialect::Oracle),
        StatementClass::Ddl
    );
}

#[test]
fn test_nested_mutation_blocks_autorun() {
    let sql = "SELECT * FROM (DELETE FROM T RETURNING *) x";
    for dialect in [SqlDialect::Oracle, SqlDialect::PostgreSql] {
        assert!(contains_nested_mutation(sql, dialect));
        assert!(!is_safe_to_autorun(sql, dialect));
    }
    assert!(is_safe_to_autorun("SELECT A FROM T", SqlDialect::PostgreSql));
}

#[test]
fn test_policy_examples() {
    let catalog = hr_catalog();
    let config = PolicyConfig::default();

    let verdict = validate(
        "SELECT EMP_ID FROM EMPLOYEE FETCH FIRST 10 ROWS ONLY",
        SqlDialect::Oracle,
        &catalog,
        &config,
    );
    assert!(verdict.passed);
    assert!(verdict.errors.is_empty());

    let verdict = validate("SELECT * FROM EMPLOYEE", SqlDialect::Oracle, &catalog, &config);
    assert!(!verdict.passed);
    assert!(verdict.has(ViolationKind::WildcardSelect));
    assert!(verdict.has(ViolationKind::MissingRowLimit));

    let verdict = validate(
        "SELECT RRN_BACK FROM EMPLOYEE FETCH FIRST 1 ROWS ONLY",
        SqlDialect::Oracle,
        &catalog,
        &config,
    );
    assert!(!verdict.passed);
    assert!(verdict.has(ViolationKind::PiiReference));
}

#[test]
fn test_row_limit_ceiling_round_trip() {
    let catalog = hr_catalog();
    let sql = "SELECT EMP_ID, EMP_NAME FROM EMPLOYEE FETCH FIRST 100 ROWS ONLY";

    for ceiling in [100, 500, 10_000] {
        let config = PolicyConfig::default().with_max_rows(ceiling);
        assert!(validate(sql, SqlDialect::Oracle, &catalog, &config).passed);
    }

    let config = PolicyConfig::default().with_max_rows(50);
    let verdict = validate(sql, SqlDialect::Oracle, &catalog, &config);
    assert!(!verdict.passed);
    assert!(verdict.errors.iter().any(|e| e.contains("100")));
}

#[test]
fn test_validate_is_idempotent() {
    let catalog = hr_catalog();
    let config = PolicyConfig::default();
    let sql = "SELECT E.EMP_NAM, RRN_BACK FROM EMPLOYEE E WHERE ROWNUM <= 50000";

    let first = validate(sql, SqlDialect::Oracle, &catalog, &config);
    let second = validate(sql, SqlDialect::Oracle, &catalog, &config);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_policy_from_toml() {
    let catalog = hr_catalog();
    let config = PolicyConfig::from_toml_str(
        r#"
        dialect = "postgresql"
        max_rows = 200
        pii_deny_columns = ["EMPLOYEE.RRN_FRONT", "EMPLOYEE.RRN_BACK"]
        "#,
    )
    .unwrap();

    let verdict = validate(
        "SELECT RRN_FRONT FROM EMPLOYEE LIMIT 500",
        config.dialect,
        &catalog,
        &config,
    );
    assert!(verdict.has(ViolationKind::PiiReference));
    assert!(verdict.has(ViolationKind::RowLimitExceeded));
}

#[test]
fn test_sales_lineage() {
    let lineage = extract_lineage(SALES_ETL, SqlDialect::Oracle);
    assert_eq!(lineage.error, None);
    assert_eq!(lineage.target_table.as_deref(), Some("DW_SALES"));
    assert_eq!(lineage.source_tables, vec!["ODS_SALES"]);
    assert_eq!(lineage.column_lineage.len(), 2);
    assert!(lineage.column_lineage[1].transform.contains("NVL"));
    assert_eq!(lineage.column_lineage[1].source_col, "AMT");
}

#[test]
fn test_sales_impact() {
    let graph = build_graph(&extract_lineage(SALES_ETL, SqlDialect::Oracle));

    assert!(graph
        .impact("ODS_SALES.AMT", ImpactDirection::Forward)
        .contains(&"DW_SALES.SALE_AMT".to_string()));
    assert!(graph
        .impact("DW_SALES.SALE_AMT", ImpactDirection::Backward)
        .contains(&"ODS_SALES.AMT".to_string()));
    assert!(graph
        .impact("ODS_SALES.MISSING", ImpactDirection::Forward)
        .is_empty());
}

#[test]
fn test_multi_join_attribution() {
    let lineage = extract_lineage(
        "INSERT INTO DW_ORDER_FACT (ORDER_ID, CUST_NAME, REGION) \
         SELECT O.ORDER_ID, C.CUST_NAME, REGION \
         FROM ODS_ORDERS O JOIN ODS_CUSTOMER C ON O.CUST_ID = C.CUST_ID",
        SqlDialect::Oracle,
    );
    assert_eq!(lineage.source_tables, vec!["ODS_ORDERS", "ODS_CUSTOMER"]);

    let graph = build_graph(&lineage);
    // qualified columns follow their alias
    assert_eq!(
        graph.impact("DW_ORDER_FACT.CUST_NAME", ImpactDirection::Backward),
        vec!["ODS_CUSTOMER.CUST_NAME"]
    );
    // unqualified columns fall back to the first source table
    assert_eq!(
        graph.impact("DW_ORDER_FACT.REGION", ImpactDirection::Backward),
        vec!["ODS_ORDERS.REGION"]
    );
}

#[test]
fn test_cte_fed_insert_lineage() {
    let lineage = extract_lineage(
        "WITH x AS (SELECT A, B FROM SRC) \
         INSERT INTO TGT (C1, C2) SELECT A, NVL(B,0) FROM x",
        SqlDialect::Oracle,
    );
    assert_eq!(lineage.target_table.as_deref(), Some("TGT"));
    assert_eq!(lineage.source_tables, vec!["SRC"]);
    assert_eq!(lineage.ctes, vec!["x"]);

    let graph = build_graph(&lineage);
    assert_eq!(
        graph.impact("TGT.C2", ImpactDirection::Backward),
        vec!["SRC.B"]
    );
}

#[test]
fn test_batch_lineage_has_no_self_loop() {
    let lineage = extract_lineage(
        "SELECT Q FROM TGT2; INSERT INTO TGT2 (C) SELECT Z FROM SRC2",
        SqlDialect::Oracle,
    );
    assert_eq!(lineage.source_tables, vec!["SRC2"]);
    assert!(lineage.table_lineage.iter().all(|e| e.from != e.to));

    let graph = build_graph(&lineage);
    assert!(graph.contains("SRC2.Z"));
    assert!(!graph.contains("TGT2.Z"));
    assert_eq!(
        graph.impact("SRC2.Z", ImpactDirection::Forward),
        vec!["TGT2.C"]
    );
}

#[test]
fn test_pipeline_is_deterministic() {
    let catalog = hr_catalog();
    let config = PolicyConfig::default();
    let analyzer = Analyzer::new(&catalog, &config);
    let sql = "WITH ranked AS (SELECT E.EMP_ID, D.DEPT_NAME FROM EMPLOYEE E \
               JOIN DEPARTMENT D ON E.DEPT_ID = D.DEPT_ID) \
               SELECT EMP_ID, UPPER(DEPT_NAME) AS DEPT FROM ranked FETCH FIRST 10 ROWS ONLY";

    let first = analyzer.analyze(sql, SqlDialect::Oracle);
    let second = analyzer.analyze(sql, SqlDialect::Oracle);
    assert_eq!(
        serde_json::to_string(&first.lineage).unwrap(),
        serde_json::to_string(&second.lineage).unwrap()
    );
    assert_eq!(
        build_graph(&first.lineage).export(),
        build_graph(&second.lineage).export()
    );
    assert_eq!(first.lineage.ctes, vec!["ranked"]);
    assert_eq!(first.lineage.source_tables, vec!["EMPLOYEE", "DEPARTMENT"]);
    assert!(first.approved(), "{:?}", first.verdict.errors);
}

#[test]
fn test_table_diagram_for_sales() {
    let lineage = extract_lineage(SALES_ETL, SqlDialect::Oracle);
    assert_eq!(
        render_mermaid_tables(&lineage),
        "flowchart LR\n    ODS_SALES[\"ODS_SALES\"]\n    DW_SALES[(\"DW_SALES\")]\n    ODS_SALES --> DW_SALES"
    );
}
