//! Generic grouping passes
//!
//! Turns the flat leaf stream into statement trees. Each pass rewrites the
//! children of token-list groups (statements, parentheses, CASE, WHERE) after
//! first recursing into every nested group.

use super::extension::{alias_start, group_functions_as, group_window, is_bare_name};
use super::node::{
    extend_group, group_range, next_significant, prev_significant, Group, GroupKind, Node,
};
use super::token::Leaf;

type Pass = fn(&mut Vec<Node>);

const PASSES: &[Pass] = &[
    group_functions,
    group_functions_as,
    group_window,
    group_where,
    group_identifiers,
    group_typecasts,
    group_operations,
    group_comparisons,
    group_boolean,
    group_aliases,
    group_identifier_lists,
];

const WHERE_END: &[&str] = &[
    "GROUP",
    "ORDER",
    "HAVING",
    "LIMIT",
    "UNION",
    "INTERSECT",
    "EXCEPT",
    "MINUS",
    "QUALIFY",
    "WINDOW",
    "RETURNING",
    "CLUSTER",
    "DISTRIBUTE",
    "SORT",
];

const PATTERN_OPERATORS: &[&str] = &["LIKE", "ILIKE", "RLIKE", "REGEXP", "IN"];

/// Keywords that can never name an alias
const CLAUSE_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "FROM", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "UNION",
    "INTERSECT", "EXCEPT", "MINUS", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL",
    "ON", "USING", "WITH", "AND", "OR", "NOT", "CASE", "WHEN", "THEN", "ELSE", "END", "WINDOW",
    "QUALIFY", "INTO", "VALUES", "LATERAL",
];

/// Split leaves into statements and run every grouping pass over each
pub(crate) fn group_statements(leaves: Vec<Leaf>) -> Vec<Node> {
    nest(leaves)
        .into_iter()
        .map(|mut statement| {
            for pass in PASSES {
                apply(&mut statement, *pass);
            }
            Node::Group(statement)
        })
        .collect()
}

fn apply(group: &mut Group, pass: Pass) {
    for child in group.children.iter_mut() {
        if let Node::Group(sub) = child {
            apply(sub, pass);
        }
    }
    if group.kind.is_token_list() {
        pass(&mut group.children);
    }
}

/// Nest parentheses and CASE blocks, splitting statements on top-level `;`
fn nest(leaves: Vec<Leaf>) -> Vec<Group> {
    let mut statements = Vec::new();
    let mut stack: Vec<Group> = Vec::new();
    let mut current = Group::new(GroupKind::Statement, Vec::new());

    for leaf in leaves {
        let node = Node::Leaf(leaf);
        if node.is_punctuation("(") {
            stack.push(Group::new(GroupKind::Parenthesis, vec![node]));
        } else if node.is_keyword("CASE") {
            stack.push(Group::new(GroupKind::Case, vec![node]));
        } else if node.is_punctuation(")")
            && stack.iter().any(|g| g.kind == GroupKind::Parenthesis)
        {
            // an unterminated CASE ends with its enclosing parenthesis
            while stack
                .last()
                .is_some_and(|g| g.kind != GroupKind::Parenthesis)
            {
                close_top(&mut stack, &mut current);
            }
            push_node(&mut stack, &mut current, node);
            close_top(&mut stack, &mut current);
        } else if node.is_keyword("END") && stack.last().is_some_and(|g| g.kind == GroupKind::Case)
        {
            push_node(&mut stack, &mut current, node);
            close_top(&mut stack, &mut current);
        } else if node.is_punctuation(";") && stack.is_empty() {
            current.children.push(node);
            statements.push(std::mem::replace(
                &mut current,
                Group::new(GroupKind::Statement, Vec::new()),
            ));
        } else {
            push_node(&mut stack, &mut current, node);
        }
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut current);
    }
    statements.push(current);

    statements.retain(|statement| {
        statement
            .children
            .iter()
            .any(|n| !n.is_negligible() && !n.is_punctuation(";"))
    });
    statements
}

fn push_node(stack: &mut [Group], current: &mut Group, node: Node) {
    match stack.last_mut() {
        Some(top) => top.children.push(node),
        None => current.children.push(node),
    }
}

fn close_top(stack: &mut Vec<Group>, current: &mut Group) {
    if let Some(group) = stack.pop() {
        push_node(stack, current, Node::Group(group));
    }
}

pub(crate) fn contains_keyword(nodes: &[Node], keyword: &str) -> bool {
    nodes.iter().any(|n| n.is_keyword(keyword))
}

fn group_functions(nodes: &mut Vec<Node>) {
    // column definitions of CREATE TABLE look like calls
    if contains_keyword(nodes, "CREATE") && contains_keyword(nodes, "TABLE") {
        return;
    }
    group_calls(nodes);
}

/// Group `name (...)` into a function call
pub(crate) fn group_calls(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_name() {
            let next = idx
                + 1
                + nodes[idx + 1..]
                    .iter()
                    .take_while(|n| n.is_whitespace())
                    .count();
            if next < nodes.len() && nodes[next].is_kind(GroupKind::Parenthesis) {
                group_range(nodes, idx, next, GroupKind::Function);
            }
        }
        idx += 1;
    }
}

fn group_where(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_keyword("WHERE") {
            let end = (idx + 1..nodes.len())
                .find(|&i| {
                    nodes[i].keyword().is_some_and(|k| WHERE_END.contains(&k))
                        || nodes[i].is_punctuation(";")
                })
                .unwrap_or(nodes.len());
            group_range(nodes, idx, end - 1, GroupKind::Where);
        }
        idx += 1;
    }
}

/// Group `name(.name)*` chains, and wrap standalone names
fn group_identifiers(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_name() {
            let mut end = idx;
            while end + 2 < nodes.len()
                && nodes[end + 1].is_punctuation(".")
                && (nodes[end + 2].is_name()
                    || nodes[end + 2].is_wildcard()
                    || nodes[end + 2].is_kind(GroupKind::Function))
            {
                end += 2;
            }
            group_range(nodes, idx, end, GroupKind::Identifier);
        }
        idx += 1;
    }
}

fn is_operand(node: &Node) -> bool {
    match node.group_kind() {
        Some(kind) => !matches!(
            kind,
            GroupKind::Statement | GroupKind::Where | GroupKind::IdentifierList
        ),
        None => {
            node.is_literal()
                || node.is_name()
                || matches!(node.keyword(), Some("NULL" | "TRUE" | "FALSE"))
        }
    }
}

fn group_typecasts(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_punctuation("::") {
            if let (Some(left), Some(right)) =
                (prev_significant(nodes, idx), next_significant(nodes, idx))
            {
                if is_operand(&nodes[left]) {
                    group_range(nodes, left, right, GroupKind::TypeCast);
                    idx = left + 1;
                    continue;
                }
            }
        }
        idx += 1;
    }
}

fn group_operations(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_operator() {
            if let (Some(left), Some(right)) =
                (prev_significant(nodes, idx), next_significant(nodes, idx))
            {
                if is_operand(&nodes[left]) && is_operand(&nodes[right]) {
                    if nodes[left].is_kind(GroupKind::Operation) {
                        extend_group(nodes, left, right);
                    } else {
                        group_range(nodes, left, right, GroupKind::Operation);
                    }
                    idx = left + 1;
                    continue;
                }
            }
        }
        idx += 1;
    }
}

fn group_comparisons(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if let Some((start, end)) = comparison_span(nodes, idx) {
            group_range(nodes, start, end, GroupKind::Comparison);
            idx = start + 1;
            continue;
        }
        idx += 1;
    }
}

fn comparison_span(nodes: &[Node], idx: usize) -> Option<(usize, usize)> {
    let node = &nodes[idx];
    let pattern = node
        .keyword()
        .is_some_and(|k| PATTERN_OPERATORS.contains(&k));
    let between = node.is_keyword("BETWEEN");
    let is = node.is_keyword("IS");
    if !(node.is_comparison_operator() || pattern || between || is) {
        return None;
    }

    let mut left = prev_significant(nodes, idx)?;
    if (pattern || between) && nodes[left].is_keyword("NOT") {
        left = prev_significant(nodes, left)?;
    }
    if !is_operand(&nodes[left]) {
        return None;
    }

    let mut right = next_significant(nodes, idx)?;
    if is && nodes[right].is_keyword("NOT") {
        right = next_significant(nodes, right)?;
    }
    if between {
        let and = next_significant(nodes, right)?;
        if !nodes[and].is_keyword("AND") {
            return None;
        }
        right = next_significant(nodes, and)?;
    }
    is_operand(&nodes[right]).then_some((left, right))
}

fn is_boolean_operation(node: &Node) -> bool {
    node.is_kind(GroupKind::Operation)
        && node
            .children()
            .iter()
            .any(|c| c.is_keyword("AND") || c.is_keyword("OR"))
}

fn group_boolean(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_keyword("NOT") {
            if let Some(operand) = next_significant(nodes, idx).filter(|&n| is_operand(&nodes[n])) {
                group_range(nodes, idx, operand, GroupKind::Operation);
            }
        }
        idx += 1;
    }

    idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_keyword("AND") || nodes[idx].is_keyword("OR") {
            if let (Some(left), Some(right)) =
                (prev_significant(nodes, idx), next_significant(nodes, idx))
            {
                if is_operand(&nodes[left]) && is_operand(&nodes[right]) {
                    if is_boolean_operation(&nodes[left]) {
                        extend_group(nodes, left, right);
                    } else {
                        group_range(nodes, left, right, GroupKind::Operation);
                    }
                    idx = left + 1;
                    continue;
                }
            }
        }
        idx += 1;
    }
}

/// Expressions that may take an alias
fn is_aliasable(node: &Node) -> bool {
    match node.group_kind() {
        Some(GroupKind::Identifier) => alias_start(node.children()).is_none(),
        Some(GroupKind::Statement | GroupKind::Where | GroupKind::IdentifierList) => false,
        Some(_) => true,
        None => node.is_literal() || matches!(node.keyword(), Some("NULL" | "TRUE" | "FALSE")),
    }
}

/// Nodes that may follow `AS`
fn is_alias_target(node: &Node) -> bool {
    match node.group_kind() {
        Some(GroupKind::Identifier) => alias_start(node.children()).is_none(),
        Some(GroupKind::Parenthesis | GroupKind::Function) => true,
        Some(_) => false,
        None => {
            node.is_name()
                || node.is_literal()
                || node
                    .keyword()
                    .is_some_and(|k| !CLAUSE_KEYWORDS.contains(&k))
        }
    }
}

fn attach_alias(nodes: &mut Vec<Node>, start: usize, end: usize) {
    if nodes[start].is_kind(GroupKind::Identifier) {
        extend_group(nodes, start, end);
    } else {
        group_range(nodes, start, end, GroupKind::Identifier);
    }
}

fn group_aliases(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_keyword("AS") {
            if let Some(start) = prev_significant(nodes, idx).filter(|&p| is_aliasable(&nodes[p])) {
                let end = match next_significant(nodes, idx) {
                    Some(next) if is_alias_target(&nodes[next]) => Some(next),
                    // `expr AS` with nothing usable after it
                    Some(next) if nodes[next].is_punctuation(",") || nodes[next].is_keyword("FROM") => {
                        Some(idx)
                    }
                    None => Some(idx),
                    Some(_) => None,
                };
                if let Some(end) = end {
                    attach_alias(nodes, start, end);
                    idx = start + 1;
                    continue;
                }
            }
        }
        idx += 1;
    }

    idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_group() && is_aliasable(&nodes[idx]) {
            let next = idx
                + 1
                + nodes[idx + 1..]
                    .iter()
                    .take_while(|n| n.is_whitespace())
                    .count();
            if next > idx + 1 && next < nodes.len() && is_bare_name(&nodes[next]) {
                attach_alias(nodes, idx, next);
            }
        }
        idx += 1;
    }
}

fn is_list_item(node: &Node) -> bool {
    match node.group_kind() {
        Some(GroupKind::Statement | GroupKind::Where) => false,
        Some(_) => true,
        None => {
            node.is_literal()
                || node.is_wildcard()
                || node.is_name()
                || matches!(node.keyword(), Some("NULL" | "TRUE" | "FALSE"))
        }
    }
}

fn group_identifier_lists(nodes: &mut Vec<Node>) {
    let mut idx = 0;
    while idx < nodes.len() {
        if nodes[idx].is_punctuation(",") {
            if let (Some(left), Some(right)) =
                (prev_significant(nodes, idx), next_significant(nodes, idx))
            {
                if is_list_item(&nodes[left]) && is_list_item(&nodes[right]) {
                    if nodes[left].is_kind(GroupKind::IdentifierList) {
                        extend_group(nodes, left, right);
                    } else {
                        group_range(nodes, left, right, GroupKind::IdentifierList);
                    }
                    idx = left + 1;
                    continue;
                }
            }
        }
        idx += 1;
    }
}
