//! Schema builder - converts CREATE TABLE DDL into a Catalog

use sqlparser::ast::{
    ColumnOption, ColumnOptionDef, CreateTable, ObjectName, Statement, TableConstraint,
};
use sqlparser::parser::Parser;

use crate::dialect::SqlDialect;
use crate::error::{SentryError, SentryResult};
use crate::parser::split_sql_statements;
use crate::schema::{Catalog, ColumnDef, ForeignKeyDef, PrimaryKeyDef, TableDef};

/// Builder for constructing a Catalog from SQL schema definitions
pub struct SchemaBuilder {
    catalog: Catalog,
    dialect: SqlDialect,
    skipped: usize,
}

impl SchemaBuilder {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            catalog: Catalog::new(),
            dialect,
            skipped: 0,
        }
    }

    /// Parse SQL schema definitions and add every table to the catalog
    ///
    /// Statements other than `CREATE TABLE` are ignored. Fails only when the
    /// text contains statements and none of them parse.
    pub fn parse(&mut self, sql: &str) -> SentryResult<()> {
        let parser_dialect = self.dialect.parser_dialect();

        // Try parsing the entire SQL first (fast path)
        match Parser::parse_sql(parser_dialect.as_ref(), sql) {
            Ok(statements) => {
                for stmt in &statements {
                    self.process_statement(stmt);
                }
                Ok(())
            }
            Err(e) => {
                tracing::debug!(error = %e, "schema DDL did not parse as a whole");
                self.parse_statements_individually(sql, e.to_string())
            }
        }
    }

    /// Parse statements one at a time, skipping those that fail to parse
    /// (procedures, triggers, vendor-specific storage clauses).
    fn parse_statements_individually(&mut self, sql: &str, first_error: String) -> SentryResult<()> {
        let parser_dialect = self.dialect.parser_dialect();
        let mut parsed_any = false;

        for raw_stmt in split_sql_statements(sql) {
            let trimmed = raw_stmt.trim();
            if trimmed.is_empty() {
                continue;
            }

            match Parser::parse_sql(parser_dialect.as_ref(), trimmed) {
                Ok(stmts) => {
                    parsed_any = true;
                    for stmt in &stmts {
                        self.process_statement(stmt);
                    }
                }
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(error = %e, "skipping unparseable schema statement");
                }
            }
        }

        if parsed_any {
            Ok(())
        } else {
            Err(SentryError::SchemaDdl(first_error))
        }
    }

    fn process_statement(&mut self, stmt: &Statement) {
        if let Statement::CreateTable(create) = stmt {
            self.process_create_table(create);
        }
    }

    fn process_create_table(&mut self, create: &CreateTable) {
        let mut table = TableDef::new(object_name_to_string(&create.name));

        for column in &create.columns {
            let mut col_def = ColumnDef::new(&column.name.value, column.data_type.to_string());
            for option in &column.options {
                process_column_option(&mut col_def, &mut table, option);
            }
            table.add_column(col_def);
        }

        for constraint in &create.constraints {
            process_table_constraint(&mut table, constraint);
        }

        self.catalog.add_table(table);
    }

    /// Number of statements skipped because they failed to parse
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Consume the builder and return the catalog
    pub fn build(self) -> Catalog {
        self.catalog
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new(SqlDialect::default())
    }
}

/// Apply NOT NULL, PRIMARY KEY and REFERENCES column options
fn process_column_option(col: &mut ColumnDef, table: &mut TableDef, option: &ColumnOptionDef) {
    match &option.option {
        ColumnOption::Null => col.nullable = true,
        ColumnOption::NotNull => col.nullable = false,
        ColumnOption::Unique { is_primary, .. } if *is_primary => {
            col.is_primary_key = true;
            col.nullable = false;
            table.primary_key = Some(PrimaryKeyDef {
                name: option.name.as_ref().map(|n| n.value.clone()),
                columns: vec![col.name.clone()],
            });
        }
        ColumnOption::ForeignKey {
            foreign_table,
            referred_columns,
            ..
        } => {
            table.foreign_keys.push(ForeignKeyDef {
                name: option.name.as_ref().map(|n| n.value.clone()),
                columns: vec![col.name.clone()],
                references_table: object_name_to_string(foreign_table),
                references_columns: referred_columns
                    .iter()
                    .map(|c| c.value.to_uppercase())
                    .collect(),
            });
        }
        _ => {}
    }
}

/// Apply table-level PRIMARY KEY and FOREIGN KEY constraints
fn process_table_constraint(table: &mut TableDef, constraint: &TableConstraint) {
    match constraint {
        TableConstraint::PrimaryKey { columns, name, .. } => {
            let pk = PrimaryKeyDef {
                name: name.as_ref().map(|n| n.value.clone()),
                columns: columns.iter().map(|c| c.value.to_uppercase()).collect(),
            };
            for col_name in &pk.columns {
                if let Some(col) = table.columns.get_mut(col_name) {
                    col.is_primary_key = true;
                    col.nullable = false;
                }
            }
            table.primary_key = Some(pk);
        }
        TableConstraint::ForeignKey {
            columns,
            foreign_table,
            referred_columns,
            name,
            ..
        } => {
            table.foreign_keys.push(ForeignKeyDef {
                name: name.as_ref().map(|n| n.value.clone()),
                columns: columns.iter().map(|c| c.value.to_uppercase()).collect(),
                references_table: object_name_to_string(foreign_table),
                references_columns: referred_columns
                    .iter()
                    .map(|c| c.value.to_uppercase())
                    .collect(),
            });
        }
        _ => {}
    }
}

/// Dotted, unquoted, uppercased form of an object name
fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.to_uppercase())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_table() {
        let sql = r#"
            CREATE TABLE employee (
                emp_id NUMBER PRIMARY KEY,
                emp_name VARCHAR(100) NOT NULL,
                rrn_back VARCHAR(7)
            );
        "#;

        let mut builder = SchemaBuilder::new(SqlDialect::Oracle);
        builder.parse(sql).unwrap();
        let catalog = builder.build();

        let table = catalog.get_table("EMPLOYEE").unwrap();
        assert_eq!(table.columns.len(), 3);

        let id_col = table.get_column("emp_id").unwrap();
        assert!(!id_col.nullable);
        assert!(id_col.is_primary_key);
        assert_eq!(
            table.primary_key.as_ref().map(|pk| pk.columns.clone()),
            Some(vec!["EMP_ID".to_string()])
        );

        let name_col = table.get_column("EMP_NAME").unwrap();
        assert!(!name_col.nullable);
        assert!(name_col.data_type.starts_with("VARCHAR"));

        assert!(table.get_column("rrn_back").unwrap().nullable);
    }

    #[test]
    fn test_parse_table_constraints() {
        let sql = r#"
            CREATE TABLE dept_sales_daily (
                sales_date DATE,
                dept_id INTEGER REFERENCES department(dept_id),
                revenue_amt DECIMAL(18, 2),
                PRIMARY KEY (sales_date, dept_id)
            );
        "#;

        let mut builder = SchemaBuilder::new(SqlDialect::PostgreSql);
        builder.parse(sql).unwrap();
        let catalog = builder.build();

        let table = catalog.get_table("dept_sales_daily").unwrap();
        let pk = table.primary_key.as_ref().unwrap();
        assert_eq!(pk.columns, vec!["SALES_DATE", "DEPT_ID"]);
        assert!(table.get_column("SALES_DATE").unwrap().is_primary_key);
        assert_eq!(table.foreign_keys.len(), 1);
        assert_eq!(table.foreign_keys[0].references_table, "DEPARTMENT");
    }

    #[test]
    fn test_skips_unparseable_statements() {
        let sql = r#"
            CREATE TABLE department (dept_id INTEGER PRIMARY KEY, dept_name TEXT);
            THIS IS NOT SQL AT ALL;
            CREATE INDEX idx_dept_name ON department (dept_name);
        "#;

        let mut builder = SchemaBuilder::new(SqlDialect::PostgreSql);
        builder.parse(sql).unwrap();
        assert_eq!(builder.skipped(), 1);
        let catalog = builder.build();
        assert!(catalog.has_table("DEPARTMENT"));
        assert_eq!(catalog.tables.len(), 1);
    }

    #[test]
    fn test_nothing_parseable_is_an_error() {
        let mut builder = SchemaBuilder::new(SqlDialect::PostgreSql);
        let err = builder.parse("NOT SQL; ALSO NOT SQL").unwrap_err();
        assert!(matches!(err, SentryError::SchemaDdl(_)));
    }
}
