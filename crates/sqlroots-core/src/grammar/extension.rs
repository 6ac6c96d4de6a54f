//! Lineage-specific grammar extensions
//!
//! Helpers that read (and in two cases regroup) the generic tree so that
//! subqueries, window calls, multi-part names and UNION branches can be
//! handled as single units.

use std::collections::BTreeSet;

use super::grouping::{contains_keyword, group_calls};
use super::node::{
    first_significant, group_range, last_significant, next_significant, prev_significant, Group,
    GroupKind, Node,
};
use super::token::TokenKind;

const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

/// A subquery parenthesis together with the name it is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQueryParenthesis {
    /// Innermost parenthesis, with UNION branch parentheses flattened
    pub parenthesis: Node,
    /// Lower-cased alias or CTE name
    pub alias: Option<String>,
}

impl SubQueryParenthesis {
    fn new(parenthesis: &Node, alias: Option<String>) -> Self {
        Self {
            parenthesis: subquery_body(parenthesis),
            alias,
        }
    }
}

/// Unwrap redundant parentheses around a query, flattening UNION branches at every level
pub fn subquery_body(parenthesis: &Node) -> Node {
    let mut current = remove_parenthesis_between_union(parenthesis);
    loop {
        let inner = current
            .children()
            .iter()
            .skip(1)
            .find(|c| !c.is_negligible())
            .filter(|c| c.is_kind(GroupKind::Parenthesis))
            .map(remove_parenthesis_between_union);
        match inner {
            Some(inner) => current = inner,
            None => return current,
        }
    }
}

/// Descend through parentheses that directly wrap another parenthesis
pub fn get_innermost_parenthesis(node: &Node) -> &Node {
    let mut current = node;
    while current.is_kind(GroupKind::Parenthesis) {
        let inner = current
            .children()
            .iter()
            .skip(1)
            .find(|c| !c.is_negligible());
        match inner {
            Some(child) if child.is_kind(GroupKind::Parenthesis) => current = child,
            _ => break,
        }
    }
    current
}

/// A parenthesis whose innermost body starts a query
pub fn is_subquery(node: &Node) -> bool {
    if !node.is_kind(GroupKind::Parenthesis) {
        return false;
    }
    get_innermost_parenthesis(node)
        .children()
        .iter()
        .skip(1)
        .find(|c| !c.is_negligible())
        .is_some_and(|c| c.is_keyword("SELECT") || c.is_keyword("WITH"))
}

/// Splice parenthesized UNION branches into their parent
///
/// `((SELECT ...) UNION ALL (SELECT ...))` becomes
/// `(SELECT ... UNION ALL SELECT ...)`. Non-group nodes are returned as is.
pub fn remove_parenthesis_between_union(node: &Node) -> Node {
    match node {
        Node::Group(group) => Node::Group(Group::new(
            group.kind,
            flatten_union_branches(&group.children),
        )),
        Node::Leaf(_) => node.clone(),
    }
}

pub(crate) fn flatten_union_branches(children: &[Node]) -> Vec<Node> {
    let unions: Vec<usize> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| c.keyword().is_some_and(|k| SET_OPERATORS.contains(&k)))
        .map(|(i, _)| i)
        .collect();
    if unions.is_empty() {
        return children.to_vec();
    }

    let mut unwrap = BTreeSet::new();
    for (n, &union) in unions.iter().enumerate() {
        if n == 0 {
            if let Some(prev) = prev_significant(children, union) {
                if children[prev].is_kind(GroupKind::Parenthesis) {
                    unwrap.insert(prev);
                }
            }
        }
        let mut next = next_significant(children, union);
        if let Some(quantifier) =
            next.filter(|&i| matches!(children[i].keyword(), Some("ALL" | "DISTINCT")))
        {
            next = next_significant(children, quantifier);
        }
        if let Some(next) = next.filter(|&i| children[i].is_kind(GroupKind::Parenthesis)) {
            unwrap.insert(next);
        }
    }

    let mut flattened = Vec::with_capacity(children.len());
    for (i, child) in children.iter().enumerate() {
        if unwrap.contains(&i) {
            flattened.extend(parenthesis_body(get_innermost_parenthesis(child)).iter().cloned());
        } else {
            flattened.push(child.clone());
        }
    }
    flattened
}

/// Children of a parenthesis without the enclosing `(` and `)`
pub fn parenthesis_body(node: &Node) -> &[Node] {
    let children = node.children();
    if !node.is_kind(GroupKind::Parenthesis) || children.is_empty() {
        return children;
    }
    let end = if children.len() > 1 && children[children.len() - 1].is_punctuation(")") {
        children.len() - 1
    } else {
        children.len()
    };
    &children[1..end]
}

/// A single-name identifier, as used for implicit aliases
pub(crate) fn is_bare_name(node: &Node) -> bool {
    node.is_kind(GroupKind::Identifier) && {
        let mut significant = node.significant();
        significant.next().is_some_and(Node::is_name) && significant.next().is_none()
    }
}

/// Index of the first child belonging to an identifier's alias (`AS` or the implicit alias)
pub(crate) fn alias_start(children: &[Node]) -> Option<usize> {
    if let Some(idx) = children.iter().position(|n| n.is_keyword("AS")) {
        return Some(idx);
    }
    let last = last_significant(children)?;
    let prev = prev_significant(children, last)?;
    let spaced = children[last - 1].is_whitespace();
    (spaced && is_bare_name(&children[last]) && !children[prev].is_punctuation(".")).then_some(last)
}

/// Children of an identifier that precede its alias
pub fn identifier_body(node: &Node) -> &[Node] {
    let children = node.children();
    if node.is_kind(GroupKind::Identifier) {
        &children[..alias_start(children).unwrap_or(children.len())]
    } else {
        children
    }
}

/// Whether an identifier carries `AS`, with or without a usable alias after it
pub fn has_alias(node: &Node) -> bool {
    node.is_kind(GroupKind::Identifier) && alias_start(node.children()).is_some()
}

/// Alias of an identifier, `None` when absent or when `AS` introduces a subquery
pub fn get_alias(node: &Node) -> Option<String> {
    if !node.is_kind(GroupKind::Identifier) {
        return None;
    }
    let children = node.children();
    let start = alias_start(children)?;
    let alias = if children[start].is_keyword("AS") {
        &children[next_significant(children, start)?]
    } else {
        &children[start]
    };
    match alias {
        Node::Leaf(leaf) => match leaf.kind {
            TokenKind::Name => Some(leaf.normalized().to_string()),
            TokenKind::Keyword | TokenKind::Dml | TokenKind::Ddl => Some(leaf.value.clone()),
            TokenKind::Literal => Some(leaf.value.trim_matches(['\'', '"']).to_string()),
            _ => None,
        },
        Node::Group(group) => match group.kind {
            GroupKind::Identifier => get_identifier_name_and_parent(alias).0,
            GroupKind::Function => function_name(alias),
            _ => None,
        },
    }
}

/// Name of a function call or window call
pub fn function_name(node: &Node) -> Option<String> {
    match node.group_kind() {
        Some(GroupKind::Function) => first_name(node.children()),
        Some(GroupKind::Window) => node
            .children()
            .iter()
            .find(|c| c.is_kind(GroupKind::Function))
            .and_then(function_name),
        _ => None,
    }
}

fn first_name(nodes: &[Node]) -> Option<String> {
    nodes.iter().find_map(|node| match node {
        Node::Leaf(leaf) if leaf.kind == TokenKind::Name => Some(leaf.normalized().to_string()),
        Node::Leaf(leaf) if leaf.kind == TokenKind::Wildcard => Some("*".to_string()),
        Node::Group(group) if group.kind == GroupKind::Identifier => {
            get_identifier_name_and_parent(node).0
        }
        Node::Group(group) if group.kind == GroupKind::Function => function_name(node),
        _ => None,
    })
}

fn name_text(node: &Node) -> String {
    match node {
        Node::Leaf(leaf) if leaf.kind == TokenKind::Name => leaf.normalized().to_string(),
        _ => node.to_string(),
    }
}

/// Split an identifier into its real name and the qualifier before the last dot
///
/// `a.b.c` gives `(c, a.b)`. A parenthesized subquery with an alias gives
/// the alias as the name. Names come back unquoted but with their case intact.
pub fn get_identifier_name_and_parent(node: &Node) -> (Option<String>, Option<String>) {
    if let Node::Leaf(_) = node {
        return (first_name(std::slice::from_ref(node)), None);
    }
    let body = identifier_body(node);
    match body.iter().rposition(|n| n.is_punctuation(".")) {
        Some(dot) => {
            let parent: String = body[..dot]
                .iter()
                .filter(|n| !n.is_negligible())
                .map(name_text)
                .collect();
            let parent = (!parent.is_empty()).then_some(parent);
            (first_name(&body[dot + 1..]), parent)
        }
        None => {
            let subquery_alias = first_significant(body)
                .filter(|&i| is_subquery(&body[i]))
                .and_then(|_| get_alias(node));
            match subquery_alias {
                Some(alias) => (Some(alias), None),
                None => (first_name(body), None),
            }
        }
    }
}

/// Lower-cased `parent.name` of an identifier or function
pub fn get_identifier_fullname_normalized(node: &Node) -> Option<String> {
    let (name, parent) = match node.group_kind() {
        Some(GroupKind::Function) => (function_name(node), None),
        _ => get_identifier_name_and_parent(node),
    };
    let name = name?;
    let full = match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name,
    };
    Some(full.to_lowercase())
}

/// Members of an identifier list, or the node itself
pub fn list_items(node: &Node) -> Vec<&Node> {
    if node.is_kind(GroupKind::IdentifierList) {
        node.significant()
            .filter(|n| !n.is_punctuation(","))
            .collect()
    } else {
        vec![node]
    }
}

/// Conditions of a CASE or WHERE, looking through AND/OR/NOT
fn condition_branches(node: &Node) -> Vec<&Node> {
    let mut branches = Vec::new();
    for sub in node.sublists() {
        if sub.is_kind(GroupKind::Operation) {
            branches.extend(condition_branches(sub));
        } else {
            branches.push(sub);
        }
    }
    branches
}

/// Every subquery parenthesis nested directly in an identifier, function,
/// parenthesis or WHERE clause
///
/// Handles `name AS (subquery)`, `name (subquery)`, `(subquery) alias`, and
/// subqueries inside the branches of a CASE or WHERE condition. A CASE branch
/// that is itself a subquery is attributed to the enclosing column name.
pub fn get_subquery_parentheses(node: &Node) -> Vec<SubQueryParenthesis> {
    let mut found = Vec::new();
    let Some(group) = node.as_group() else {
        return found;
    };
    let children = &group.children;

    let target = match group.kind {
        GroupKind::Parenthesis | GroupKind::Where => Some(node),
        GroupKind::Function => children.iter().find(|c| c.is_kind(GroupKind::Parenthesis)),
        GroupKind::Identifier => {
            let after_as = children
                .iter()
                .position(|c| c.is_keyword("AS"))
                .and_then(|i| next_significant(children, i))
                .map(|i| &children[i])
                .filter(|c| c.is_kind(GroupKind::Parenthesis));
            after_as.or_else(|| first_significant(children).map(|i| &children[i]))
        }
        _ => None,
    };
    let Some(target) = target else {
        return found;
    };

    match target.group_kind() {
        Some(GroupKind::Case | GroupKind::Where) => {
            let enclosing = if node.is_kind(GroupKind::Identifier) {
                get_alias(node)
                    .or_else(|| get_identifier_name_and_parent(node).0)
                    .map(|name| name.to_lowercase())
            } else {
                None
            };
            for branch in condition_branches(target) {
                if branch.is_kind(GroupKind::Comparison) {
                    for operand in branch.sublists().filter(|o| is_subquery(o)) {
                        found.push(SubQueryParenthesis::new(operand, None));
                    }
                } else if is_subquery(branch) {
                    found.push(SubQueryParenthesis::new(branch, enclosing.clone()));
                }
            }
        }
        _ if is_subquery(target) => {
            let alias = if node.is_kind(GroupKind::Parenthesis) {
                None
            } else {
                get_identifier_fullname_normalized(node)
            };
            found.push(SubQueryParenthesis::new(target, alias));
        }
        _ => {}
    }
    found
}

/// Arguments of a function call as grouped sub-expressions
///
/// Literals, keywords and a bare `*` are skipped. For a window call the
/// wrapped function's arguments come first, then the groups of the window
/// definition (PARTITION BY / ORDER BY expressions).
pub fn get_parameters(node: &Node) -> Vec<&Node> {
    match node.group_kind() {
        Some(GroupKind::Function) => node
            .children()
            .iter()
            .rev()
            .find(|c| c.is_kind(GroupKind::Parenthesis))
            .map(|paren| paren.sublists().collect())
            .unwrap_or_default(),
        Some(GroupKind::Window) => {
            let children = node.children();
            let mut parameters = children
                .iter()
                .find(|c| c.is_kind(GroupKind::Function))
                .map(get_parameters)
                .unwrap_or_default();
            if let Some(definition) = children
                .iter()
                .rev()
                .find(|c| c.is_kind(GroupKind::Parenthesis))
            {
                parameters.extend(definition.sublists());
            }
            parameters
        }
        _ => Vec::new(),
    }
}

/// Group `<function> OVER (<window definition>)` into a window call
pub(crate) fn group_window(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_kind(GroupKind::Function) {
            let definition = next_significant(nodes, idx)
                .filter(|&over| nodes[over].is_keyword("OVER"))
                .and_then(|over| next_significant(nodes, over))
                .filter(|&def| nodes[def].is_kind(GroupKind::Parenthesis));
            if let Some(definition) = definition {
                group_range(nodes, idx, definition, GroupKind::Window);
            }
        }
        idx += 1;
    }
}

/// Function calls in the projection of `CREATE TABLE ... AS` are skipped by
/// the generic pass; group them here
pub(crate) fn group_functions_as(nodes: &mut Vec<Node>) {
    if ["CREATE", "TABLE", "AS"]
        .iter()
        .all(|keyword| contains_keyword(nodes, keyword))
    {
        group_calls(nodes);
    }
}
