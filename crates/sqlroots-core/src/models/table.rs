use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::escape_identifier_name;
use crate::error::{LineageError, Result};
use crate::grammar::extension::{get_alias, get_identifier_name_and_parent};
use crate::grammar::Node;

/// Default database and schema used to qualify bare table names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub default_database: Option<String>,
    pub default_schema: Option<String>,
}

impl TableMetadata {
    pub fn new(default_database: Option<String>, default_schema: Option<String>) -> Self {
        Self {
            default_database,
            default_schema,
        }
    }

    /// Complete a table's parent qualifier
    ///
    /// A missing qualifier becomes `db.schema` when both defaults are set. A
    /// schema-only qualifier gets the default database prepended.
    fn complete(&self, parent: Option<String>) -> Option<String> {
        match parent {
            None => match (&self.default_database, &self.default_schema) {
                (Some(db), Some(schema)) => Some(format!("{db}.{schema}")),
                _ => None,
            },
            Some(parent) if !parent.contains('.') => match &self.default_database {
                Some(db) => Some(format!("{db}.{parent}")),
                None => Some(parent),
            },
            parent => parent,
        }
    }
}

/// Namespace of a table: `schema` or `database.schema`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Schema {
    raw_name: Option<String>,
}

impl Schema {
    pub const UNKNOWN: &'static str = "<default>";

    pub fn new(name: &str) -> Self {
        Self {
            raw_name: Some(escape_identifier_name(name).to_lowercase()),
        }
    }

    pub fn unknown() -> Self {
        Self { raw_name: None }
    }

    pub fn is_known(&self) -> bool {
        self.raw_name.is_some()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw_name {
            Some(name) => f.write_str(name),
            None => f.write_str(Self::UNKNOWN),
        }
    }
}

/// A table, identified by its schema and name
///
/// Equality and hashing only consider the lower-cased `schema.name`; the
/// alias is carried along for display.
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: Schema,
    pub raw_name: String,
    pub alias: String,
}

impl Table {
    /// Build from `name`, `schema.name` or `db.schema.name`
    pub fn new(name: &str) -> Result<Self> {
        Self::with_schema(name, Schema::unknown())
    }

    /// Build from a name, using `schema` only when the name is unqualified
    pub fn with_schema(name: &str, schema: Schema) -> Result<Self> {
        let (schema, raw_name) = match name.rsplit_once('.') {
            Some((qualifier, table)) => {
                if qualifier.matches('.').count() > 1 {
                    return Err(LineageError::invalid_table_name(name));
                }
                if schema.is_known() {
                    tracing::warn!(
                        table = name,
                        schema = %schema,
                        "qualified table name overrides the given schema"
                    );
                }
                (Schema::new(qualifier), escape_identifier_name(table))
            }
            None => (schema, escape_identifier_name(name)),
        };
        Ok(Self {
            schema,
            alias: raw_name.clone(),
            raw_name,
        })
    }

    /// Build from an identifier (or function-style target) node, completing
    /// the qualifier from `metadata`
    pub fn of(node: &Node, metadata: &TableMetadata) -> Result<Self> {
        let (name, parent) = get_identifier_name_and_parent(node);
        let name = name.unwrap_or_else(|| node.to_string().trim().to_string());
        let table = match metadata.complete(parent) {
            Some(parent) => Self::new(&format!("{parent}.{name}"))?,
            None => Self::new(&name)?,
        };
        Ok(match get_alias(node) {
            Some(alias) => table.with_alias(alias),
            None => table,
        })
    }

    /// Build from a column qualifier such as `sch.tab`, completing it from `metadata`
    pub fn from_qualifier(qualifier: &str, metadata: &TableMetadata) -> Result<Self> {
        match qualifier.rsplit_once('.') {
            Some((parent, name)) => match metadata.complete(Some(parent.to_string())) {
                Some(parent) => Self::new(&format!("{parent}.{name}")),
                None => Self::new(qualifier),
            },
            None => match metadata.complete(None) {
                Some(parent) => Self::new(&format!("{parent}.{qualifier}")),
                None => Self::new(qualifier),
            },
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Lower-cased name as written in SQL: `schema.name`, or `name` when no schema is known
    pub fn qualified_name(&self) -> String {
        if self.schema.is_known() {
            format!("{}.{}", self.schema, self.raw_name.to_lowercase())
        } else {
            self.raw_name.to_lowercase()
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.raw_name.to_lowercase())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Table {}

impl Hash for Table {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// A non-table sink or source, such as a directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    pub uri: String,
}

impl Path {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: escape_identifier_name(uri.trim_matches('\'')),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_split_at_last_dot() {
        let table = Table::new("db.schema.table").unwrap();
        assert_eq!(table.schema, Schema::new("db.schema"));
        assert_eq!(table.raw_name, "table");
        assert_eq!(table.to_string(), "db.schema.table");
    }

    #[test]
    fn test_too_many_qualifiers() {
        assert_eq!(
            Table::new("a.b.c.d").unwrap_err(),
            LineageError::invalid_table_name("a.b.c.d")
        );
    }

    #[test]
    fn test_equality_ignores_case_and_alias() {
        let a = Table::new("Sch.Tab1").unwrap().with_alias("x");
        let b = Table::new("sch.tab1").unwrap();
        assert_eq!(a, b);
        let set: HashSet<Table> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unknown_schema_display() {
        let table = Table::new("tab1").unwrap();
        assert_eq!(table.to_string(), "<default>.tab1");
        assert_eq!(table.qualified_name(), "tab1");
    }

    #[test]
    fn test_metadata_completion() {
        let metadata = TableMetadata::new(Some("db".into()), Some("sch".into()));
        assert_eq!(
            Table::from_qualifier("tab1", &metadata).unwrap().to_string(),
            "db.sch.tab1"
        );
        assert_eq!(
            Table::from_qualifier("other.tab1", &metadata)
                .unwrap()
                .to_string(),
            "db.other.tab1"
        );
        assert_eq!(
            Table::from_qualifier("x.y.tab1", &metadata)
                .unwrap()
                .to_string(),
            "x.y.tab1"
        );

        let schema_only = TableMetadata::new(None, Some("sch".into()));
        assert_eq!(
            Table::from_qualifier("tab1", &schema_only)
                .unwrap()
                .to_string(),
            "<default>.tab1"
        );
    }

    #[test]
    fn test_with_schema_keeps_explicit_qualifier() {
        let table = Table::with_schema("a.tab", Schema::new("b")).unwrap();
        assert_eq!(table.to_string(), "a.tab");
        let table = Table::with_schema("tab", Schema::new("b")).unwrap();
        assert_eq!(table.to_string(), "b.tab");
    }

    #[test]
    fn test_path_strips_quotes() {
        assert_eq!(Path::new("'hdfs://a/b'").uri, "hdfs://a/b");
    }
}
