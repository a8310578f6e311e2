//! Schema catalog - read-only snapshot of tables and columns
//!
//! Names are stored uppercased and every lookup is case-insensitive.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{SentryError, SentryResult};

/// Schema catalog - holds all table information supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Uppercased table name -> TableDef
    pub tables: IndexMap<String, TableDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table to the catalog, replacing any table of the same name
    pub fn add_table(&mut self, table: TableDef) {
        self.tables.insert(normalize_name(&table.name), table);
    }

    /// Look up a table by name
    ///
    /// A `schema.table` name also matches a table registered without the
    /// schema part.
    pub fn get_table(&self, name: &str) -> Option<&TableDef> {
        let key = normalize_name(name);
        self.tables.get(&key).or_else(|| {
            key.rsplit_once('.')
                .and_then(|(_, bare)| self.tables.get(bare))
        })
    }

    /// Check if a table exists
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Check a bare `COLUMN` or a qualified `TABLE.COLUMN` identifier
    pub fn has_column(&self, ident: &str) -> bool {
        match ident.rsplit_once('.') {
            Some((table, column)) => self
                .get_table(table)
                .is_some_and(|t| t.column_exists(column)),
            None => self.tables.values().any(|t| t.column_exists(ident)),
        }
    }

    /// Get all table names
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.values().map(|t| t.name.as_str()).collect()
    }

    /// Closest known table or column name, for "did you mean" hints
    pub fn similar_identifier(&self, name: &str) -> Option<String> {
        let upper = name.to_uppercase();
        let target = upper.rsplit('.').next().unwrap_or(upper.as_str());
        let candidates = self
            .tables
            .values()
            .flat_map(|t| std::iter::once(t.name.as_str()).chain(t.column_names()));

        let mut best_match: Option<(usize, &str)> = None;
        for candidate in candidates {
            let distance = levenshtein_distance(target, &candidate.to_uppercase());
            // Only suggest if reasonably similar (distance <= 3)
            if distance <= 3 && best_match.map_or(true, |(best, _)| distance < best) {
                best_match = Some((distance, candidate));
            }
        }

        best_match.map(|(_, name)| name.to_string())
    }

    /// Build a catalog from the schema collaborator's JSON mapping
    ///
    /// Accepts either `{ "TABLE": {...} }` or `{ "tables": { "TABLE": {...} } }`.
    /// Columns may be plain names or `{ "name", "type" }` objects.
    pub fn from_json_str(json: &str) -> SentryResult<Self> {
        let raw: RawCatalog =
            serde_json::from_str(json).map_err(|e| SentryError::Catalog(e.to_string()))?;
        let tables = match raw {
            RawCatalog::Wrapped { tables } => tables,
            RawCatalog::Bare(tables) => tables,
        };

        let mut catalog = Catalog::new();
        for (name, raw_table) in tables {
            catalog.add_table(raw_table.into_table_def(name));
        }
        tracing::debug!(tables = catalog.tables.len(), "loaded schema catalog");
        Ok(catalog)
    }
}

/// Table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    /// Uppercased column name -> ColumnDef
    pub columns: IndexMap<String, ColumnDef>,
    pub primary_key: Option<PrimaryKeyDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            columns: IndexMap::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.add_column(column);
        self
    }

    pub fn add_column(&mut self, column: ColumnDef) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(&normalize_name(name))
    }

    /// Check if a column exists
    pub fn column_exists(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Get all column names
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.values().map(|c| c.name.as_str())
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Type as reported by the catalog source, uninterpreted
    pub data_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            data_type: data_type.into(),
            nullable: true,
            is_primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }
}

/// Primary key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub references_table: String,
    pub references_columns: Vec<String>,
}

/// Uppercase and strip identifier quotes
fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect::<String>()
        .to_uppercase()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCatalog {
    Wrapped { tables: IndexMap<String, RawTable> },
    Bare(IndexMap<String, RawTable>),
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<RawColumn>,
    #[serde(default, alias = "primaryKey", alias = "pk")]
    primary_key: Vec<String>,
    #[serde(default, alias = "foreignKeys", alias = "fk")]
    foreign_keys: Vec<RawForeignKey>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Name(String),
    Typed {
        name: String,
        #[serde(default, rename = "type")]
        data_type: String,
    },
}

#[derive(Deserialize)]
struct RawForeignKey {
    #[serde(alias = "col")]
    column: String,
    #[serde(alias = "refTable")]
    ref_table: String,
    #[serde(alias = "refColumn", alias = "ref_col")]
    ref_column: String,
}

impl RawTable {
    fn into_table_def(self, name: String) -> TableDef {
        let mut table = TableDef::new(name);
        let pk: Vec<String> = self.primary_key.iter().map(|c| normalize_name(c)).collect();

        for column in self.columns {
            let mut def = match column {
                RawColumn::Name(name) => ColumnDef::new(name, ""),
                RawColumn::Typed { name, data_type } => ColumnDef::new(name, data_type),
            };
            if pk.contains(&def.name) {
                def = def.primary_key();
            }
            table.add_column(def);
        }

        if !pk.is_empty() {
            table.primary_key = Some(PrimaryKeyDef {
                name: None,
                columns: pk,
            });
        }

        table.foreign_keys = self
            .foreign_keys
            .into_iter()
            .map(|fk| ForeignKeyDef {
                name: None,
                columns: vec![normalize_name(&fk.column)],
                references_table: normalize_name(&fk.ref_table),
                references_columns: vec![normalize_name(&fk.ref_column)],
            })
            .collect();

        table
    }
}

/// Simple Levenshtein distance implementation
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}
