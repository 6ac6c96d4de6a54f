//! Grouped token tree

use std::fmt;

use super::token::{Leaf, TokenKind};

/// Kinds of grouped nodes produced by the grouping passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Statement,
    Parenthesis,
    /// `name(...)`
    Function,
    /// `<function> OVER (...)`
    Window,
    /// Dotted name, or any expression carrying an alias
    Identifier,
    IdentifierList,
    Comparison,
    /// Arithmetic or boolean operation
    Operation,
    /// `expr::type`
    TypeCast,
    Case,
    Where,
}

impl GroupKind {
    /// Groups whose children form a free token list that grouping passes rewrite
    pub(crate) fn is_token_list(self) -> bool {
        matches!(
            self,
            GroupKind::Statement | GroupKind::Parenthesis | GroupKind::Case | GroupKind::Where
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub kind: GroupKind,
    pub children: Vec<Node>,
}

impl Group {
    pub fn new(kind: GroupKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }
}

/// A node of the grouped tree: either a token or a group of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Leaf),
    Group(Group),
}

impl Node {
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(group) => Some(group),
            Node::Leaf(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }

    pub fn group_kind(&self) -> Option<GroupKind> {
        self.as_group().map(|g| g.kind)
    }

    pub fn is_kind(&self, kind: GroupKind) -> bool {
        self.group_kind() == Some(kind)
    }

    fn is_leaf_of(&self, kind: TokenKind) -> bool {
        self.as_leaf().is_some_and(|leaf| leaf.kind == kind)
    }

    pub fn is_negligible(&self) -> bool {
        self.as_leaf().is_some_and(Leaf::is_negligible)
    }

    pub fn is_whitespace(&self) -> bool {
        self.is_leaf_of(TokenKind::Whitespace)
    }

    pub fn is_name(&self) -> bool {
        self.is_leaf_of(TokenKind::Name)
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_leaf_of(TokenKind::Wildcard)
    }

    pub fn is_literal(&self) -> bool {
        self.is_leaf_of(TokenKind::Literal)
    }

    pub fn is_operator(&self) -> bool {
        self.is_leaf_of(TokenKind::Operator)
    }

    pub fn is_comparison_operator(&self) -> bool {
        self.is_leaf_of(TokenKind::Comparison)
    }

    /// Upper-cased keyword text, if this is a keyword leaf
    pub fn keyword(&self) -> Option<&str> {
        self.as_leaf()
            .filter(|leaf| leaf.is_keyword_like())
            .map(Leaf::normalized)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.keyword() == Some(keyword)
    }

    pub fn is_punctuation(&self, text: &str) -> bool {
        self.as_leaf()
            .is_some_and(|leaf| leaf.kind == TokenKind::Punctuation && leaf.value == text)
    }

    /// Children of a group, empty for leaves
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Group(group) => &group.children,
            Node::Leaf(_) => &[],
        }
    }

    /// Direct children that are groups themselves
    pub fn sublists(&self) -> impl Iterator<Item = &Node> {
        self.children().iter().filter(|n| n.is_group())
    }

    /// Direct children that are neither whitespace nor comments
    pub fn significant(&self) -> impl Iterator<Item = &Node> {
        self.children().iter().filter(|n| !n.is_negligible())
    }

    /// Render the tree one node per line, for debugging
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Node::Leaf(leaf) if leaf.kind == TokenKind::Whitespace => {}
            Node::Leaf(leaf) => {
                out.push_str(&format!("{indent}{:?} {:?}\n", leaf.kind, leaf.value));
            }
            Node::Group(group) => {
                out.push_str(&format!("{indent}{:?}\n", group.kind));
                for child in &group.children {
                    child.write_tree(out, depth + 1);
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Leaf(leaf) => f.write_str(&leaf.value),
            Node::Group(group) => group.children.iter().try_for_each(|c| write!(f, "{c}")),
        }
    }
}

pub(crate) fn next_significant(nodes: &[Node], idx: usize) -> Option<usize> {
    (idx + 1..nodes.len()).find(|&i| !nodes[i].is_negligible())
}

pub(crate) fn prev_significant(nodes: &[Node], idx: usize) -> Option<usize> {
    (0..idx).rev().find(|&i| !nodes[i].is_negligible())
}

pub(crate) fn first_significant(nodes: &[Node]) -> Option<usize> {
    nodes.iter().position(|n| !n.is_negligible())
}

pub(crate) fn last_significant(nodes: &[Node]) -> Option<usize> {
    nodes.iter().rposition(|n| !n.is_negligible())
}

/// Replace `nodes[start..=end]` with a single group of `kind`
pub(crate) fn group_range(nodes: &mut Vec<Node>, start: usize, end: usize, kind: GroupKind) {
    let children: Vec<Node> = nodes.drain(start..=end).collect();
    nodes.insert(start, Node::Group(Group::new(kind, children)));
}

/// Move `nodes[target + 1..=end]` into the group at `target`
pub(crate) fn extend_group(nodes: &mut Vec<Node>, target: usize, end: usize) {
    let tail: Vec<Node> = nodes.drain(target + 1..=end).collect();
    if let Node::Group(group) = &mut nodes[target] {
        group.children.extend(tail);
    }
}
