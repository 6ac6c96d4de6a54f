//! Error types

use miette::Diagnostic;
use thiserror::Error;

/// Fatal errors raised while deriving lineage
///
/// Everything that is not listed here degrades to empty or partial lineage
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LineageError {
    /// More than one dot in the schema portion of a qualified name
    #[error("invalid format for table name: {name}")]
    #[diagnostic(
        code(sqlroots::invalid_table_name),
        help("a table name may carry at most a database and a schema qualifier, e.g. db.schema.table")
    )]
    InvalidTableName { name: String },

    /// The SQL text could not be split into tokens
    #[error("failed to tokenize SQL: {message}")]
    #[diagnostic(code(sqlroots::tokenize))]
    Tokenize { message: String },
}

impl LineageError {
    pub fn invalid_table_name(name: impl Into<String>) -> Self {
        LineageError::InvalidTableName { name: name.into() }
    }
}

/// Result alias used throughout the core crate
pub type Result<T, E = LineageError> = std::result::Result<T, E>;
