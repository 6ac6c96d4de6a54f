//! Scope resolver - attaches raw column references to the parents in scope

use indexmap::{IndexMap, IndexSet};

use crate::error::Result;
use crate::models::{Column, Parent, Table, TableMetadata};

/// Lower-cased qualifier (alias or name) to the parent it refers to
pub type AliasMapping = IndexMap<String, Parent>;

/// Register every name `parent` can be referred to by
///
/// The first registration of a key wins, so an earlier FROM item keeps its
/// alias when a later one reuses the same name.
pub fn register(mapping: &mut AliasMapping, parent: &Parent, alias: Option<&str>) {
    let mut keys = Vec::with_capacity(3);
    if let Some(alias) = alias {
        keys.push(alias.to_lowercase());
    }
    match parent {
        Parent::Table(table) => {
            keys.push(table.alias.to_lowercase());
            keys.push(table.raw_name.to_lowercase());
            keys.push(table.qualified_name());
        }
        Parent::SubQuery(subquery) => keys.push(subquery.alias.to_lowercase()),
        Parent::Path(path) => keys.push(path.uri.clone()),
    }
    for key in keys {
        mapping.entry(key).or_insert_with(|| parent.clone());
    }
}

/// Resolve the raw references of `column` against the parents in scope
///
/// - `*` fans out to one wildcard column per distinct parent
/// - an unqualified name gets every parent in scope as a candidate
/// - a qualifier is looked up by alias, falling back to a table built from
///   the qualifier itself
pub fn resolve(
    column: &Column,
    alias_mapping: &AliasMapping,
    metadata: &TableMetadata,
) -> Result<IndexSet<Column>> {
    let in_scope: IndexSet<&Parent> = alias_mapping.values().collect();
    let mut resolved = IndexSet::new();

    for reference in column.source_columns() {
        match &reference.qualifier {
            None if reference.column == "*" => {
                for parent in &in_scope {
                    resolved.insert(Column::new("*").with_parent((*parent).clone()));
                }
            }
            None => {
                let mut source = Column::new(&reference.column);
                for parent in &in_scope {
                    source.add_parent((*parent).clone());
                }
                resolved.insert(source);
            }
            Some(qualifier) => {
                let parent = match alias_mapping.get(&qualifier.to_lowercase()) {
                    Some(parent) => parent.clone(),
                    None => {
                        tracing::debug!(qualifier, "qualifier not in scope, treating as a table");
                        Parent::Table(Table::from_qualifier(qualifier, metadata)?)
                    }
                };
                resolved.insert(Column::new(&reference.column).with_parent(parent));
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnQualifier;
    use pretty_assertions::assert_eq;

    fn table(name: &str, alias: &str) -> Parent {
        Parent::Table(Table::new(name).unwrap().with_alias(alias))
    }

    fn reading(references: &[(&str, Option<&str>)]) -> Column {
        let sources = references
            .iter()
            .map(|(c, q)| ColumnQualifier::new(*c, q.map(str::to_string)))
            .collect();
        Column::with_sources("out", sources, crate::models::ColumnExpression::Direct)
    }

    fn displayed(columns: &IndexSet<Column>) -> Vec<String> {
        columns.iter().map(ToString::to_string).collect()
    }

    fn two_tables() -> AliasMapping {
        let mut mapping = AliasMapping::new();
        register(&mut mapping, &table("tab1", "a"), None);
        register(&mut mapping, &table("sch.tab2", "b"), None);
        mapping
    }

    #[test]
    fn test_register_keys() {
        let mapping = two_tables();
        let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "tab1", "b", "tab2", "sch.tab2"]);
    }

    #[test]
    fn test_qualified_by_alias() {
        let resolved = resolve(
            &reading(&[("col1", Some("A")), ("col2", Some("sch.tab2"))]),
            &two_tables(),
            &TableMetadata::default(),
        )
        .unwrap();
        assert_eq!(
            displayed(&resolved),
            vec!["<default>.tab1.col1", "sch.tab2.col2"]
        );
    }

    #[test]
    fn test_unknown_qualifier_becomes_table() {
        let metadata = TableMetadata::new(Some("db".into()), Some("sch".into()));
        let resolved = resolve(&reading(&[("col1", Some("tab9"))]), &two_tables(), &metadata).unwrap();
        assert_eq!(displayed(&resolved), vec!["db.sch.tab9.col1"]);
    }

    #[test]
    fn test_unqualified_keeps_all_candidates() {
        let resolved = resolve(&reading(&[("col1", None)]), &two_tables(), &TableMetadata::default())
            .unwrap();
        let column = resolved.first().unwrap();
        assert_eq!(column.parent(), None);
        assert_eq!(column.parent_candidates().len(), 2);
    }

    #[test]
    fn test_single_source_unqualified() {
        let mut mapping = AliasMapping::new();
        register(&mut mapping, &table("tab1", "tab1"), None);
        let resolved = resolve(&reading(&[("col1", None)]), &mapping, &TableMetadata::default())
            .unwrap();
        assert_eq!(displayed(&resolved), vec!["<default>.tab1.col1"]);
    }

    #[test]
    fn test_wildcard_fans_out() {
        let resolved = resolve(&reading(&[("*", None)]), &two_tables(), &TableMetadata::default())
            .unwrap();
        assert_eq!(displayed(&resolved), vec!["<default>.tab1.*", "sch.tab2.*"]);
    }

    #[test]
    fn test_empty_scope() {
        let mapping = AliasMapping::new();
        let resolved = resolve(&reading(&[("*", None), ("col1", None)]), &mapping, &TableMetadata::default())
            .unwrap();
        assert_eq!(displayed(&resolved), vec!["col1"]);
    }
}
