//! Statement analysis
//!
//! Walks the top-level tokens of a statement clause by clause, recording
//! read and write tables, CTEs and subqueries, and turns each projected
//! column into edges of the column graph.

use indexmap::IndexMap;
use tracing::debug;

use super::extract::projected_column;
use super::holder::StatementLineage;
use super::resolver::{register, resolve, AliasMapping};
use super::LineageAnalyzer;
use crate::error::Result;
use crate::grammar::extension::{
    flatten_union_branches, get_alias, get_identifier_name_and_parent, get_subquery_parentheses,
    identifier_body, is_subquery, list_items, parenthesis_body, subquery_body,
};
use crate::grammar::{GroupKind, Node};
use crate::models::{Column, Parent, Path, SubQuery, Table};

/// Keywords a statement must start with to carry lineage
const ANALYZABLE: &[&str] = &["SELECT", "WITH", "INSERT", "CREATE"];

const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT", "MINUS"];

/// What the next non-keyword node of a query belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    None,
    Target,
    TargetPath,
    Cte,
    Column,
    Source,
}

/// Write target and visible CTEs of one query body
#[derive(Debug, Clone, Default)]
struct QueryScope {
    write: Option<Parent>,
    /// Explicit column list of the write target
    write_columns: Vec<Column>,
    ctes: IndexMap<String, SubQuery>,
}

/// One branch of a set operation
#[derive(Debug, Default)]
struct Branch {
    columns: Vec<Column>,
    sources: Vec<(Parent, Option<String>)>,
}

pub(super) struct StatementAnalyzer<'s, 'a> {
    analyzer: &'s LineageAnalyzer<'a>,
    lineage: StatementLineage,
}

impl<'s, 'a> StatementAnalyzer<'s, 'a> {
    pub(super) fn new(analyzer: &'s LineageAnalyzer<'a>) -> Self {
        Self {
            analyzer,
            lineage: StatementLineage::default(),
        }
    }

    pub(super) fn analyze(mut self, statement: &Node) -> Result<StatementLineage> {
        let first = statement.significant().find(|n| !n.is_punctuation(";"));
        let analyzable = first.is_some_and(|n| {
            n.is_kind(GroupKind::Parenthesis)
                || n.keyword().is_some_and(|k| ANALYZABLE.contains(&k))
        });
        if !analyzable {
            debug!(statement = %statement.to_string().trim(), "skipping statement without lineage");
            return Ok(self.lineage);
        }

        let mut scope = QueryScope::default();
        self.analyze_query(statement.children(), &mut scope)?;
        Ok(self.lineage)
    }

    fn analyze_query(&mut self, nodes: &[Node], scope: &mut QueryScope) -> Result<()> {
        let nodes = flatten_union_branches(nodes);
        let significant: Vec<&Node> = nodes
            .iter()
            .filter(|n| !n.is_negligible() && !n.is_punctuation(";"))
            .collect();
        if let [only] = significant.as_slice() {
            if is_subquery(only) {
                let body = subquery_body(only);
                return self.analyze_query(parenthesis_body(&body), scope);
            }
        }

        let mut clause = Clause::None;
        let mut previous_keyword = None;
        let mut branches = Vec::new();
        let mut current = Branch::default();
        for node in significant {
            if let Some(keyword) = node.keyword() {
                let lateral = previous_keyword == Some("LATERAL");
                previous_keyword = Some(keyword);
                clause = match keyword {
                    "WITH" => Clause::Cte,
                    "RECURSIVE" if clause == Clause::Cte => Clause::Cte,
                    "SELECT" => Clause::Column,
                    "DISTINCT" | "ALL" if clause == Clause::Column => Clause::Column,
                    "FROM" | "JOIN" => Clause::Source,
                    "INTO" | "OVERWRITE" | "TABLE" | "VIEW" if scope.write.is_none() && !lateral => {
                        Clause::Target
                    }
                    "IF" | "NOT" | "EXISTS" | "LOCAL" if clause == Clause::Target => clause,
                    "DIRECTORY" => Clause::TargetPath,
                    k if SET_OPERATORS.contains(&k) => {
                        branches.push(std::mem::take(&mut current));
                        Clause::None
                    }
                    _ => Clause::None,
                };
                continue;
            }
            if node.is_kind(GroupKind::Where) {
                self.analyze_subqueries(node, scope)?;
                clause = Clause::None;
                continue;
            }

            match clause {
                Clause::Target => {
                    self.handle_target(node, scope)?;
                    clause = Clause::None;
                }
                Clause::TargetPath => {
                    if node.is_literal() {
                        let path = Parent::Path(Path::new(&node.to_string()));
                        self.lineage.add_write(path.clone());
                        scope.write = Some(path);
                    }
                    clause = Clause::None;
                }
                Clause::Cte => self.handle_cte(node, scope)?,
                Clause::Column => {
                    self.analyze_subqueries(node, scope)?;
                    for item in list_items(node) {
                        current.columns.push(projected_column(item, self.analyzer)?);
                    }
                }
                Clause::Source => self.handle_source(node, scope, &mut current)?,
                Clause::None => self.analyze_subqueries(node, scope)?,
            }
        }
        branches.push(current);
        self.end_of_query(branches, scope)
    }

    /// Analyze every subquery nested in `node` as its own query
    fn analyze_subqueries(&mut self, node: &Node, scope: &QueryScope) -> Result<()> {
        for item in list_items(node) {
            for found in get_subquery_parentheses(item) {
                let subquery = SubQuery::of(&found.parenthesis, found.alias);
                self.analyze_subquery(&subquery, Vec::new(), scope)?;
            }
        }
        Ok(())
    }

    fn analyze_subquery(
        &mut self,
        subquery: &SubQuery,
        write_columns: Vec<Column>,
        scope: &QueryScope,
    ) -> Result<()> {
        if !self.lineage.mark_analyzed(subquery) {
            return Ok(());
        }
        debug!(subquery = %subquery, "analyzing subquery");
        let mut inner = QueryScope {
            write: Some(Parent::SubQuery(subquery.clone())),
            write_columns,
            ctes: scope.ctes.clone(),
        };
        self.analyze_query(parenthesis_body(subquery.parenthesis()), &mut inner)
    }

    /// `INSERT INTO t`, `CREATE TABLE t (a, b)`, `CREATE VIEW v AS (...)`
    fn handle_target(&mut self, node: &Node, scope: &mut QueryScope) -> Result<()> {
        let table = Table::of(node, &self.analyzer.metadata)?;
        let parent = Parent::Table(table);
        self.lineage.add_write(parent.clone());
        scope.write = Some(parent);
        scope.write_columns = declared_columns(node);

        if let Some(query) = embedded_query(node) {
            self.analyze_query(parenthesis_body(&query), scope)?;
        }
        Ok(())
    }

    fn handle_cte(&mut self, node: &Node, scope: &mut QueryScope) -> Result<()> {
        for item in list_items(node) {
            let Some(found) = get_subquery_parentheses(item).into_iter().next() else {
                continue;
            };
            let Some(name) = found.alias else {
                continue;
            };
            let subquery = SubQuery::of(&found.parenthesis, Some(name.clone()));
            self.analyze_subquery(&subquery, declared_columns(item), scope)?;
            self.lineage.add_cte(subquery.clone());
            scope.ctes.insert(name, subquery);
        }
        Ok(())
    }

    fn handle_source(&mut self, node: &Node, scope: &QueryScope, branch: &mut Branch) -> Result<()> {
        for item in list_items(node) {
            if !matches!(
                item.group_kind(),
                Some(GroupKind::Identifier | GroupKind::Parenthesis)
            ) {
                debug!(source = %item, "skipping unsupported source");
                continue;
            }

            if let Some(found) = get_subquery_parentheses(item).into_iter().next() {
                let subquery = SubQuery::of(&found.parenthesis, found.alias.clone());
                self.analyze_subquery(&subquery, Vec::new(), scope)?;
                branch.sources.push((Parent::SubQuery(subquery), found.alias));
                continue;
            }
            if item.is_kind(GroupKind::Parenthesis) || identifier_body(item).iter().any(Node::is_group) {
                debug!(source = %item, "skipping source without a table name");
                continue;
            }

            let (name, qualifier) = get_identifier_name_and_parent(item);
            let cte = name
                .filter(|_| qualifier.is_none())
                .and_then(|name| scope.ctes.get(&name.to_lowercase()));
            if let Some(cte) = cte {
                branch
                    .sources
                    .push((Parent::SubQuery(cte.clone()), get_alias(item)));
                continue;
            }

            let table = Table::of(item, &self.analyzer.metadata)?;
            self.lineage.add_read(table.clone());
            branch.sources.push((Parent::Table(table), None));
        }
        Ok(())
    }

    /// Turn the projected columns of every branch into graph edges
    fn end_of_query(&mut self, branches: Vec<Branch>, scope: &QueryScope) -> Result<()> {
        let first_names: Vec<String> = branches
            .first()
            .map(|b| b.columns.iter().map(|c| c.raw_name().to_string()).collect())
            .unwrap_or_default();

        for (n, branch) in branches.iter().enumerate() {
            let mut mapping = AliasMapping::new();
            for (parent, alias) in &branch.sources {
                register(&mut mapping, parent, alias.as_deref());
            }

            for (i, column) in branch.columns.iter().enumerate() {
                let name = if scope.write_columns.len() == branch.columns.len() {
                    scope.write_columns[i].raw_name()
                } else if n > 0 && i < first_names.len() {
                    first_names[i].as_str()
                } else {
                    column.raw_name()
                };
                let mut target = Column::new(name);
                if let Some(write) = &scope.write {
                    target.add_parent(write.clone());
                }

                let sources = resolve(column, &mapping, &self.analyzer.metadata)?;
                let mut unexpanded = target.is_wildcard() && sources.is_empty();
                if !target.is_wildcard() {
                    self.record_output(scope, target.raw_name());
                }
                for source in sources {
                    if target.is_wildcard() {
                        if source.is_wildcard() && self.expand_wildcard(&source, &target, scope) {
                            continue;
                        }
                        unexpanded = true;
                    }
                    self.lineage.add_column_edge(source, target.clone());
                }
                if unexpanded {
                    self.record_output(scope, "*");
                }
            }
        }
        Ok(())
    }

    /// Replace `source.* -> target.*` with one edge per known column of the source
    fn expand_wildcard(&mut self, source: &Column, target: &Column, scope: &QueryScope) -> bool {
        let Some(names) = self.known_columns(source) else {
            return false;
        };
        for name in names {
            let mut expanded = Column::new(&name);
            for parent in target.parent_candidates().iter() {
                expanded.add_parent(parent.clone());
            }
            self.record_output(scope, &name);
            let origin = match source.parent() {
                Some(parent) => Column::new(&name).with_parent(parent.clone()),
                None => Column::new(&name),
            };
            self.lineage.add_column_edge(origin, expanded);
        }
        true
    }

    fn known_columns(&self, source: &Column) -> Option<Vec<String>> {
        let names: Vec<String> = match source.parent()? {
            Parent::SubQuery(subquery) => self
                .lineage
                .output_columns(subquery)?
                .iter()
                .cloned()
                .collect(),
            Parent::Table(table) => self.analyzer.schema?.columns(table)?,
            Parent::Path(_) => return None,
        };
        (!names.is_empty() && !names.iter().any(|n| n == "*")).then_some(names)
    }

    fn record_output(&mut self, scope: &QueryScope, name: &str) {
        if let Some(Parent::SubQuery(subquery)) = &scope.write {
            self.lineage.record_output(subquery, name);
        }
    }
}

/// Column list written after a target or CTE name: `t (a, b)`
fn declared_columns(node: &Node) -> Vec<Column> {
    let call = if node.is_kind(GroupKind::Function) {
        Some(node)
    } else {
        identifier_body(node)
            .iter()
            .find(|n| n.is_kind(GroupKind::Function))
    };
    let Some(parenthesis) = call.and_then(|c| {
        c.children()
            .iter()
            .rev()
            .find(|n| n.is_kind(GroupKind::Parenthesis))
    }) else {
        return Vec::new();
    };
    if is_subquery(parenthesis) {
        return Vec::new();
    }
    parenthesis
        .sublists()
        .flat_map(list_items)
        .filter_map(|item| get_identifier_name_and_parent(item).0)
        .map(|name| Column::new(&name))
        .collect()
}

/// The query of `CREATE TABLE t AS (SELECT ...)` or `INSERT INTO t (SELECT ...)`
fn embedded_query(node: &Node) -> Option<Node> {
    let parenthesis = match node.group_kind()? {
        GroupKind::Identifier => {
            let children = node.children();
            let as_at = children.iter().position(|c| c.is_keyword("AS"))?;
            children[as_at + 1..].iter().find(|c| !c.is_negligible())?
        }
        GroupKind::Function => node
            .children()
            .iter()
            .rev()
            .find(|c| c.is_kind(GroupKind::Parenthesis))?,
        _ => return None,
    };
    is_subquery(parenthesis).then(|| subquery_body(parenthesis))
}
