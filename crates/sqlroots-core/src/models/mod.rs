//! Identity model: the tables, subqueries, paths and columns lineage is expressed in

mod column;
mod subquery;
mod table;

pub use column::{Column, ColumnExpression, ColumnQualifier, Parent, ParentSet};
pub use subquery::SubQuery;
pub use table::{Path, Schema, Table, TableMetadata};

/// Strip identifier quoting: backticks, double quotes, and surrounding brackets
pub fn escape_identifier_name(name: &str) -> String {
    if name.len() >= 2 && name.starts_with('[') && name.ends_with(']') {
        return name[1..name.len() - 1].to_string();
    }
    name.replace(['`', '"'], "")
}
