//! Lineage analyzer module

mod extract;
mod holder;
mod resolver;
mod statement;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::grammar;
use crate::models::{ColumnQualifier, Parent, TableMetadata};
use crate::schema::SchemaFetcher;

pub use extract::{extract_source_columns, projected_column, SubqueryLineage};
pub use holder::{ColumnGraph, ColumnPath, LineageResult, StatementLineage};
pub use resolver::{register, resolve, AliasMapping};

use statement::StatementAnalyzer;

/// Lineage analyzer - table and column lineage of SQL scripts
pub struct LineageAnalyzer<'a> {
    dialect: SqlDialect,
    metadata: TableMetadata,
    schema: Option<&'a dyn SchemaFetcher>,
}

impl Default for LineageAnalyzer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> LineageAnalyzer<'a> {
    pub fn new() -> Self {
        Self {
            dialect: SqlDialect::default(),
            metadata: TableMetadata::default(),
            schema: None,
        }
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Default database and schema for unqualified table names
    pub fn with_metadata(mut self, metadata: TableMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Column lists used to expand `*`
    pub fn with_schema(mut self, schema: &'a dyn SchemaFetcher) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Analyze a script, failing on the first statement that cannot be analyzed
    pub fn analyze(&self, sql: &str) -> Result<LineageResult> {
        let statements = self
            .analyze_each(sql)?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        Ok(LineageResult::new(statements))
    }

    /// Analyze a script statement by statement
    ///
    /// The outer error is a tokenizer failure of the whole script; inner
    /// errors belong to single statements.
    pub fn analyze_each(&self, sql: &str) -> Result<Vec<Result<StatementLineage>>> {
        let statements = grammar::parse(sql, self.dialect)?;
        tracing::debug!(count = statements.len(), "analyzing statements");
        Ok(statements
            .iter()
            .map(|statement| StatementAnalyzer::new(self).analyze(statement))
            .collect())
    }
}

impl SubqueryLineage for LineageAnalyzer<'_> {
    fn subquery_origins(&self, query: &str) -> Result<Vec<ColumnQualifier>> {
        let result = self.analyze(query)?;
        let mut origins = Vec::new();
        for path in result.column_lineage(false) {
            let Some(source) = path.source() else {
                continue;
            };
            let origin = ColumnQualifier::new(source.raw_name(), source.parent().map(Parent::qualifier));
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        Ok(origins)
    }
}

/// Analyze `sql` with the generic dialect
pub fn analyze(sql: &str, metadata: &TableMetadata) -> Result<LineageResult> {
    LineageAnalyzer::new()
        .with_metadata(metadata.clone())
        .analyze(sql)
}
