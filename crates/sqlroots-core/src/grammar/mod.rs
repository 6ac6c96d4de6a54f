//! SQL grammar: tokenization and grouping into an expression tree
//!
//! The tree is deliberately loose. It recognizes only the shapes lineage
//! analysis needs (function calls, windows, dotted names, aliases,
//! comparisons, subqueries) and leaves everything else as plain tokens.

pub mod extension;
mod grouping;
pub mod node;
pub mod token;

pub use node::{Group, GroupKind, Node};
pub use token::{Leaf, TokenKind};

use crate::dialect::SqlDialect;
use crate::error::Result;

/// Tokenize and group SQL text into one tree per statement
pub fn parse(sql: &str, dialect: SqlDialect) -> Result<Vec<Node>> {
    let leaves = token::tokenize(sql, dialect)?;
    Ok(grouping::group_statements(leaves))
}
