//! sqlroots-core: SQL lineage library
//!
//! This library derives table-level and column-level lineage from SQL
//! scripts without a database connection. SQL is tokenized and grouped into
//! a lightweight token tree, each statement is walked clause by clause, and
//! the column dependencies are collected in a graph.

pub mod analyzer;
pub mod dialect;
pub mod error;
pub mod grammar;
pub mod models;
pub mod schema;

pub use analyzer::{analyze, ColumnPath, LineageAnalyzer, LineageResult, StatementLineage};
pub use dialect::SqlDialect;
pub use error::{LineageError, Result};
pub use models::{Column, ColumnQualifier, Parent, SubQuery, Table, TableMetadata};
pub use schema::{Catalog, SchemaBuilder, SchemaFetcher};
