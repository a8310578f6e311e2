//! Schema catalog and DDL loading

mod builder;
mod catalog;

pub use builder::SchemaBuilder;
pub use catalog::{Catalog, ColumnDef, ForeignKeyDef, PrimaryKeyDef, TableDef};
