use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{escape_identifier_name, Path, SubQuery, Table};
use crate::grammar::Node;

/// Anything that can own a column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parent {
    Table(Table),
    SubQuery(SubQuery),
    Path(Path),
}

impl Parent {
    fn rank(&self) -> u8 {
        match self {
            Parent::Table(_) => 0,
            Parent::SubQuery(_) => 1,
            Parent::Path(_) => 2,
        }
    }

    /// The string equality is based on
    fn identity(&self) -> String {
        match self {
            Parent::Table(table) => table.to_string(),
            Parent::SubQuery(subquery) => subquery.query().to_string(),
            Parent::Path(path) => path.uri.clone(),
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Parent::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_subquery(&self) -> Option<&SubQuery> {
        match self {
            Parent::SubQuery(subquery) => Some(subquery),
            _ => None,
        }
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, Parent::SubQuery(_))
    }

    /// Qualifier text that refers back to this parent from a column reference
    pub fn qualifier(&self) -> String {
        match self {
            Parent::Table(table) => table.qualified_name(),
            Parent::SubQuery(subquery) => subquery.alias.to_lowercase(),
            Parent::Path(path) => path.uri.clone(),
        }
    }
}

impl Ord for Parent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank(), self.identity()).cmp(&(other.rank(), other.identity()))
    }
}

impl PartialOrd for Parent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Table(table) => table.fmt(f),
            Parent::SubQuery(subquery) => subquery.fmt(f),
            Parent::Path(path) => path.fmt(f),
        }
    }
}

impl From<Table> for Parent {
    fn from(table: Table) -> Self {
        Parent::Table(table)
    }
}

impl From<SubQuery> for Parent {
    fn from(subquery: SubQuery) -> Self {
        Parent::SubQuery(subquery)
    }
}

impl From<Path> for Parent {
    fn from(path: Path) -> Self {
        Parent::Path(path)
    }
}

/// Candidate owners of a column, kept sorted; candidates can only be added
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParentSet(Vec<Parent>);

impl ParentSet {
    /// Returns false when the candidate was already present
    pub fn add(&mut self, parent: Parent) -> bool {
        match self.0.binary_search(&parent) {
            Ok(_) => false,
            Err(pos) => {
                self.0.insert(pos, parent);
                true
            }
        }
    }

    /// The parent, when resolution was unambiguous
    pub fn single(&self) -> Option<&Parent> {
        match self.0.as_slice() {
            [parent] => Some(parent),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parent> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An unresolved column reference: `qualifier.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnQualifier {
    pub column: String,
    pub qualifier: Option<String>,
}

impl ColumnQualifier {
    pub fn new(column: impl Into<String>, qualifier: Option<String>) -> Self {
        Self {
            column: column.into(),
            qualifier,
        }
    }
}

/// How a column is produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnExpression {
    /// A plain column reference
    Direct,
    /// Any other expression, kept for re-analysis
    Derived(Node),
}

/// A column of a table, subquery or result set
///
/// Identity is the lower-cased name plus the candidate parents.
#[derive(Debug, Clone)]
pub struct Column {
    raw_name: String,
    source_columns: Vec<ColumnQualifier>,
    expression: ColumnExpression,
    parents: ParentSet,
}

impl Column {
    /// A passthrough column whose only source is itself
    pub fn new(name: &str) -> Self {
        let raw_name = escape_identifier_name(name);
        Self {
            source_columns: vec![ColumnQualifier::new(raw_name.clone(), None)],
            raw_name,
            expression: ColumnExpression::Direct,
            parents: ParentSet::default(),
        }
    }

    pub fn with_sources(
        name: &str,
        source_columns: Vec<ColumnQualifier>,
        expression: ColumnExpression,
    ) -> Self {
        Self {
            raw_name: escape_identifier_name(name),
            source_columns,
            expression,
            parents: ParentSet::default(),
        }
    }

    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.parents.add(parent);
        self
    }

    pub fn add_parent(&mut self, parent: Parent) -> bool {
        self.parents.add(parent)
    }

    pub fn raw_name(&self) -> &str {
        &self.raw_name
    }

    /// Lower-cased name
    pub fn name(&self) -> String {
        self.raw_name.to_lowercase()
    }

    pub fn source_columns(&self) -> &[ColumnQualifier] {
        &self.source_columns
    }

    pub fn expression(&self) -> &ColumnExpression {
        &self.expression
    }

    pub fn is_wildcard(&self) -> bool {
        self.raw_name == "*"
    }

    /// The owner, when there is exactly one candidate
    pub fn parent(&self) -> Option<&Parent> {
        self.parents.single()
    }

    pub fn parent_candidates(&self) -> &ParentSet {
        &self.parents
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.parents == other.parents
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.parents.hash(state);
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent() {
            Some(Parent::Path(_)) | None => f.write_str(&self.name()),
            Some(parent) => write!(f, "{}.{}", parent, self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(name: &str) -> Parent {
        Parent::Table(Table::new(name).unwrap())
    }

    #[test]
    fn test_candidates_are_monotonic_and_ordered() {
        let mut column = Column::new("col1");
        assert!(column.add_parent(table("tab2")));
        assert!(column.add_parent(table("tab1")));
        assert!(!column.add_parent(table("TAB1")));
        let names: Vec<String> = column
            .parent_candidates()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["<default>.tab1", "<default>.tab2"]);
        assert_eq!(column.parent(), None);
        assert_eq!(column.to_string(), "col1");
    }

    #[test]
    fn test_equality_is_case_insensitive() {
        let a = Column::new("Col1").with_parent(table("tab1"));
        let b = Column::new("col1").with_parent(table("Tab1"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "<default>.tab1.col1");
        assert_ne!(a, Column::new("col1"));
    }

    #[test]
    fn test_passthrough_source() {
        let column = Column::new("`col1`");
        assert_eq!(column.raw_name(), "col1");
        assert_eq!(
            column.source_columns(),
            &[ColumnQualifier::new("col1", None)]
        );
        assert_eq!(column.expression(), &ColumnExpression::Direct);
    }

    #[test]
    fn test_path_parent_is_not_displayed() {
        let column = Column::new("col1").with_parent(Parent::Path(Path::new("'hdfs://x'")));
        assert_eq!(column.to_string(), "col1");
    }
}
