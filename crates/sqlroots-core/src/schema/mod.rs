//! Schema management module

mod builder;
mod catalog;

pub use builder::SchemaBuilder;
pub use catalog::Catalog;

use crate::models::Table;

/// Source of table column lists, consulted when expanding `*`
pub trait SchemaFetcher {
    /// Columns of `table` in definition order, `None` when the table is unknown
    fn columns(&self, table: &Table) -> Option<Vec<String>>;
}
