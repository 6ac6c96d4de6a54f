use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::grammar::extension::parenthesis_body;
use crate::grammar::Node;

/// A derived table: a parenthesized query plus the name it is referred to by
///
/// Identity is the whitespace-normalized query text, so the same subquery
/// parsed twice compares and hashes equal.
#[derive(Debug, Clone)]
pub struct SubQuery {
    parenthesis: Node,
    query: String,
    pub alias: String,
}

impl SubQuery {
    /// `alias` defaults to `subquery_<fingerprint of the query text>`
    pub fn of(parenthesis: &Node, alias: Option<String>) -> Self {
        let body: String = parenthesis_body(parenthesis)
            .iter()
            .map(ToString::to_string)
            .collect();
        let query = normalize(&body);
        let alias = alias.unwrap_or_else(|| format!("subquery_{}", fingerprint(&query)));
        Self {
            parenthesis: parenthesis.clone(),
            query,
            alias,
        }
    }

    /// The parenthesis node the subquery was built from
    pub fn parenthesis(&self) -> &Node {
        &self.parenthesis
    }

    /// Query text without the enclosing parentheses, whitespace collapsed
    pub fn query(&self) -> &str {
        &self.query
    }
}

fn normalize(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fingerprint(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

impl PartialEq for SubQuery {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
    }
}

impl Eq for SubQuery {}

impl Hash for SubQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use crate::grammar::{parse, GroupKind};

    fn first_parenthesis(sql: &str) -> Node {
        let statement = parse(sql, SqlDialect::Generic).unwrap().remove(0);
        statement
            .children()
            .iter()
            .find(|n| n.is_kind(GroupKind::Parenthesis))
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_synthetic_alias_is_content_based() {
        let a = SubQuery::of(&first_parenthesis("(SELECT col1 FROM tab1)"), None);
        let b = SubQuery::of(&first_parenthesis("(SELECT  col1\n  FROM tab1)"), None);
        assert_eq!(a, b);
        assert_eq!(a.alias, b.alias);
        assert!(a.alias.starts_with("subquery_"));
        assert_eq!(a.query(), "SELECT col1 FROM tab1");
    }

    #[test]
    fn test_alias_does_not_affect_identity() {
        let paren = first_parenthesis("(SELECT col1 FROM tab1)");
        let named = SubQuery::of(&paren, Some("dt".to_string()));
        let unnamed = SubQuery::of(&paren, None);
        assert_eq!(named, unnamed);
        assert_eq!(named.to_string(), "dt");
    }

    #[test]
    fn test_different_queries_differ() {
        let a = SubQuery::of(&first_parenthesis("(SELECT col1 FROM tab1)"), None);
        let b = SubQuery::of(&first_parenthesis("(SELECT col2 FROM tab1)"), None);
        assert_ne!(a, b);
        assert_ne!(a.alias, b.alias);
    }
}
