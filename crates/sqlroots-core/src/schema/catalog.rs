//! Schema catalog - stores table column lists

use indexmap::IndexMap;

use super::SchemaFetcher;
use crate::models::Table;

/// Schema catalog - column lists keyed by lower-cased table name
///
/// Names are stored as written (`tab`, `sch.tab` or `db.sch.tab`). A lookup
/// that misses the exact name falls back to a unique match on the bare name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: IndexMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<I, S>(mut self, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_table(name, columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add or replace a table
    pub fn add_table(&mut self, name: &str, columns: Vec<String>) {
        self.tables.insert(name.to_lowercase(), columns);
    }

    pub fn remove_table(&mut self, name: &str) -> Option<Vec<String>> {
        let key = self.resolve_key(name)?;
        self.tables.shift_remove(&key)
    }

    /// Column list of a table, for in-place changes
    pub fn table_columns_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        let key = self.resolve_key(name)?;
        self.tables.get_mut(&key)
    }

    pub fn table_columns(&self, name: &str) -> Option<&[String]> {
        let key = self.resolve_key(name)?;
        self.tables.get(&key).map(Vec::as_slice)
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.resolve_key(name).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn resolve_key(&self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        if self.tables.contains_key(&name) {
            return Some(name);
        }
        let bare = bare_name(&name);
        let mut matches = self.tables.keys().filter(|key| bare_name(key) == bare);
        match (matches.next(), matches.next()) {
            (Some(key), None) => Some(key.clone()),
            _ => None,
        }
    }
}

fn bare_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, bare)| bare)
}

impl SchemaFetcher for Catalog {
    fn columns(&self, table: &Table) -> Option<Vec<String>> {
        self.table_columns(&table.qualified_name()).map(<[String]>::to_vec)
    }
}
