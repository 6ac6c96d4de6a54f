//! Lineage holders
//!
//! [`ColumnGraph`] stores column-to-column edges; [`StatementLineage`] holds
//! everything learned from one statement; [`LineageResult`] merges statements.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexSet;
use petgraph::algo::all_simple_paths;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::models::{Column, Parent, SubQuery, Table};

/// Directed graph of columns, edges pointing from source to target
#[derive(Debug, Clone, Default)]
pub struct ColumnGraph {
    graph: DiGraph<Column, ()>,
    index: HashMap<Column, NodeIndex>,
}

impl ColumnGraph {
    /// Add a column, returning the existing node when an equal column is present
    pub fn add_column(&mut self, column: Column) -> NodeIndex {
        if let Some(&idx) = self.index.get(&column) {
            return idx;
        }
        let idx = self.graph.add_node(column.clone());
        self.index.insert(column, idx);
        idx
    }

    /// Add a `source -> target` edge; self-edges and duplicates are ignored
    pub fn add_edge(&mut self, source: Column, target: Column) {
        if source == target {
            return;
        }
        let from = self.add_column(source);
        let to = self.add_column(target);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, ());
        }
    }

    pub fn merge(&mut self, other: &ColumnGraph) {
        for column in other.graph.node_weights() {
            self.add_column(column.clone());
        }
        for edge in other.graph.edge_indices() {
            if let Some((from, to)) = other.graph.edge_endpoints(edge) {
                self.add_edge(other.graph[from].clone(), other.graph[to].clone());
            }
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.graph.node_weights()
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.index.contains_key(column)
    }

    pub fn column_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct sources of `column`
    pub fn upstream(&self, column: &Column) -> Vec<&Column> {
        self.neighbors(column, Direction::Incoming)
    }

    /// Direct targets fed by `column`
    pub fn downstream(&self, column: &Column) -> Vec<&Column> {
        self.neighbors(column, Direction::Outgoing)
    }

    fn neighbors(&self, column: &Column, direction: Direction) -> Vec<&Column> {
        match self.index.get(column) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    fn is_root(&self, idx: NodeIndex, direction: Direction) -> bool {
        self.graph.neighbors_directed(idx, direction).next().is_none()
    }

    /// Every path from a source column to a target column
    ///
    /// Sources have no incoming edge and are not subquery columns. Targets
    /// have no outgoing edge; with `exclude_subquery`, subquery columns are
    /// not targets either. Paths are sorted by target, then source.
    pub fn column_lineage(&self, exclude_subquery: bool) -> Vec<ColumnPath> {
        let sources: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.is_root(n, Direction::Incoming) && !owned_by_subquery(&self.graph[n]))
            .collect();
        let targets: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&n| self.is_root(n, Direction::Outgoing))
            .filter(|&n| !(exclude_subquery && owned_by_subquery(&self.graph[n])))
            .collect();

        let mut paths = Vec::new();
        for &source in &sources {
            for &target in &targets {
                if source == target {
                    continue;
                }
                for path in all_simple_paths::<Vec<_>, _>(&self.graph, source, target, 0, None) {
                    paths.push(ColumnPath::new(
                        path.into_iter().map(|n| self.graph[n].clone()).collect(),
                    ));
                }
            }
        }
        paths.sort_by_cached_key(ColumnPath::sort_key);
        paths
    }
}

fn owned_by_subquery(column: &Column) -> bool {
    column.parent_candidates().iter().any(Parent::is_subquery)
}

/// A chain of columns from a source (first) to a target (last)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    columns: Vec<Column>,
}

impl ColumnPath {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn source(&self) -> Option<&Column> {
        self.columns.first()
    }

    pub fn target(&self) -> Option<&Column> {
        self.columns.last()
    }

    fn sort_key(&self) -> (String, String, String) {
        let text = |column: Option<&Column>| column.map(ToString::to_string).unwrap_or_default();
        (text(self.target()), text(self.source()), self.to_string())
    }
}

impl fmt::Display for ColumnPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, column) in self.columns.iter().rev().enumerate() {
            if i > 0 {
                f.write_str(" <- ")?;
            }
            write!(f, "{column}")?;
        }
        Ok(())
    }
}

/// Everything learned from one statement
#[derive(Debug, Clone, Default)]
pub struct StatementLineage {
    read: IndexSet<Table>,
    write: IndexSet<Parent>,
    ctes: IndexSet<SubQuery>,
    graph: ColumnGraph,
    analyzed: HashSet<SubQuery>,
    subquery_columns: HashMap<SubQuery, IndexSet<String>>,
}

impl StatementLineage {
    /// Tables read from
    pub fn read(&self) -> &IndexSet<Table> {
        &self.read
    }

    /// Tables or paths written to
    pub fn write(&self) -> &IndexSet<Parent> {
        &self.write
    }

    pub fn ctes(&self) -> &IndexSet<SubQuery> {
        &self.ctes
    }

    pub fn graph(&self) -> &ColumnGraph {
        &self.graph
    }

    pub fn column_lineage(&self, exclude_subquery: bool) -> Vec<ColumnPath> {
        self.graph.column_lineage(exclude_subquery)
    }

    pub(crate) fn add_read(&mut self, table: Table) {
        self.read.insert(table);
    }

    pub(crate) fn add_write(&mut self, parent: Parent) {
        self.write.insert(parent);
    }

    pub(crate) fn add_cte(&mut self, cte: SubQuery) {
        self.ctes.insert(cte);
    }

    pub(crate) fn add_column_edge(&mut self, source: Column, target: Column) {
        self.graph.add_edge(source, target);
    }

    /// Mark a subquery as analyzed; false when it already was
    pub(crate) fn mark_analyzed(&mut self, subquery: &SubQuery) -> bool {
        self.analyzed.insert(subquery.clone())
    }

    pub(crate) fn record_output(&mut self, subquery: &SubQuery, name: &str) {
        self.subquery_columns
            .entry(subquery.clone())
            .or_default()
            .insert(name.to_string());
    }

    /// Output column names of an analyzed subquery, in projection order
    pub(crate) fn output_columns(&self, subquery: &SubQuery) -> Option<&IndexSet<String>> {
        self.subquery_columns.get(subquery)
    }
}

/// Lineage of a whole script
#[derive(Debug, Clone, Default)]
pub struct LineageResult {
    statements: Vec<StatementLineage>,
    graph: ColumnGraph,
}

impl LineageResult {
    pub fn new(statements: Vec<StatementLineage>) -> Self {
        let mut graph = ColumnGraph::default();
        for statement in &statements {
            graph.merge(&statement.graph);
        }
        Self { statements, graph }
    }

    pub fn statements(&self) -> &[StatementLineage] {
        &self.statements
    }

    pub fn graph(&self) -> &ColumnGraph {
        &self.graph
    }

    fn all_reads(&self) -> IndexSet<&Table> {
        self.statements.iter().flat_map(|s| s.read.iter()).collect()
    }

    fn all_writes(&self) -> IndexSet<&Parent> {
        self.statements.iter().flat_map(|s| s.write.iter()).collect()
    }

    /// Tables read but never written
    pub fn source_tables(&self) -> Vec<Table> {
        let writes = self.all_writes();
        self.all_reads()
            .into_iter()
            .filter(|table| !writes.contains(&Parent::Table((*table).clone())))
            .cloned()
            .collect()
    }

    /// Tables or paths written but never read
    pub fn target_tables(&self) -> Vec<Parent> {
        let reads = self.all_reads();
        self.all_writes()
            .into_iter()
            .filter(|parent| parent.as_table().map_or(true, |table| !reads.contains(table)))
            .cloned()
            .collect()
    }

    /// Tables both written and read
    pub fn intermediate_tables(&self) -> Vec<Table> {
        let writes = self.all_writes();
        self.all_reads()
            .into_iter()
            .filter(|table| writes.contains(&Parent::Table((*table).clone())))
            .cloned()
            .collect()
    }

    /// Column paths across every statement
    pub fn column_lineage(&self, exclude_subquery: bool) -> Vec<ColumnPath> {
        self.graph.column_lineage(exclude_subquery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(table: &str, name: &str) -> Column {
        Column::new(name).with_parent(Parent::Table(Table::new(table).unwrap()))
    }

    fn rendered(paths: &[ColumnPath]) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_edges_deduplicated() {
        let mut graph = ColumnGraph::default();
        graph.add_edge(column("a", "x"), column("b", "x"));
        graph.add_edge(column("a", "X"), column("b", "x"));
        assert_eq!(graph.column_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_self_edge_ignored() {
        let mut graph = ColumnGraph::default();
        graph.add_edge(Column::new("x"), Column::new("x"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_paths_through_intermediate() {
        let mut graph = ColumnGraph::default();
        graph.add_edge(column("s", "a"), column("m", "a"));
        graph.add_edge(column("m", "a"), column("t", "a"));
        graph.add_edge(column("s", "b"), column("t", "b"));
        let paths = graph.column_lineage(true);
        assert_eq!(
            rendered(&paths),
            vec![
                "<default>.t.a <- <default>.m.a <- <default>.s.a",
                "<default>.t.b <- <default>.s.b",
            ]
        );
        assert_eq!(paths[0].source(), Some(&column("s", "a")));
        assert_eq!(graph.upstream(&column("m", "a")), vec![&column("s", "a")]);
        assert_eq!(graph.downstream(&column("m", "a")), vec![&column("t", "a")]);
        assert!(graph.upstream(&column("x", "y")).is_empty());
    }

    #[test]
    fn test_subquery_targets() {
        let parenthesis = crate::grammar::parse("(SELECT a FROM s)", crate::dialect::SqlDialect::Generic)
            .unwrap()
            .remove(0)
            .children()[0]
            .clone();
        let subquery = SubQuery::of(&parenthesis, Some("sq".into()));
        let mut graph = ColumnGraph::default();
        graph.add_edge(column("s", "a"), Column::new("a").with_parent(subquery.into()));
        assert_eq!(graph.column_lineage(true), Vec::new());
        assert_eq!(rendered(&graph.column_lineage(false)), vec!["sq.a <- <default>.s.a"]);
    }

    #[test]
    fn test_table_roles() {
        let mut first = StatementLineage::default();
        first.add_read(Table::new("s").unwrap());
        first.add_write(Parent::Table(Table::new("m").unwrap()));
        let mut second = StatementLineage::default();
        second.add_read(Table::new("m").unwrap());
        second.add_write(Parent::Table(Table::new("t").unwrap()));

        let result = LineageResult::new(vec![first, second]);
        assert_eq!(result.source_tables(), vec![Table::new("s").unwrap()]);
        assert_eq!(result.intermediate_tables(), vec![Table::new("m").unwrap()]);
        assert_eq!(result.target_tables(), vec![Parent::Table(Table::new("t").unwrap())]);
    }

    #[test]
    fn test_merge_joins_statements() {
        let mut first = StatementLineage::default();
        first.add_column_edge(column("s", "a"), column("m", "a"));
        let mut second = StatementLineage::default();
        second.add_column_edge(column("m", "a"), column("t", "a"));
        let result = LineageResult::new(vec![first, second]);
        assert_eq!(
            rendered(&result.column_lineage(true)),
            vec!["<default>.t.a <- <default>.m.a <- <default>.s.a"]
        );
    }
}
