//! Source-column extraction
//!
//! Walks one projected expression and collects the raw `(column, qualifier)`
//! references it depends on, in source order.

use crate::error::Result;
use crate::grammar::extension::{
    get_alias, get_identifier_name_and_parent, get_parameters, identifier_body, is_subquery,
    parenthesis_body, subquery_body,
};
use crate::grammar::{GroupKind, Node};
use crate::models::{Column, ColumnExpression, ColumnQualifier};

/// Lineage of a scalar subquery, used when one appears inside an expression
pub trait SubqueryLineage {
    /// Origins of the subquery's output columns
    fn subquery_origins(&self, query: &str) -> Result<Vec<ColumnQualifier>>;
}

/// Raw column references an expression depends on
///
/// Literals contribute nothing, `*` contributes `("*", None)`, and a scalar
/// subquery contributes the origins of its own output columns.
pub fn extract_source_columns<S>(node: &Node, subqueries: &S) -> Result<Vec<ColumnQualifier>>
where
    S: SubqueryLineage + ?Sized,
{
    let mut references = Vec::new();
    let mut pending = vec![node];
    while let Some(node) = pending.pop() {
        let children = expand(node, subqueries, &mut references)?;
        pending.extend(children.into_iter().rev());
    }
    Ok(references)
}

/// Emit references for `node` itself and return the children to visit next
fn expand<'n, S>(
    node: &'n Node,
    subqueries: &S,
    references: &mut Vec<ColumnQualifier>,
) -> Result<Vec<&'n Node>>
where
    S: SubqueryLineage + ?Sized,
{
    let Some(kind) = node.group_kind() else {
        if node.is_wildcard() {
            references.push(ColumnQualifier::new("*", None));
        }
        return Ok(Vec::new());
    };

    let children = match kind {
        GroupKind::Function | GroupKind::Window => get_parameters(node),
        GroupKind::Parenthesis if is_subquery(node) => {
            let body = subquery_body(node);
            let query: String = parenthesis_body(&body)
                .iter()
                .map(ToString::to_string)
                .collect();
            references.extend(subqueries.subquery_origins(query.trim())?);
            Vec::new()
        }
        GroupKind::Parenthesis => parenthesis_body(node).iter().collect(),
        GroupKind::Identifier => {
            let body = identifier_body(node);
            match get_identifier_name_and_parent(node) {
                (Some(name), parent) if is_name_chain(body) => {
                    references.push(ColumnQualifier::new(name, parent));
                    Vec::new()
                }
                _ => body.iter().filter(|n| n.is_group()).collect(),
            }
        }
        // the cast target is a type, not a column
        GroupKind::TypeCast => node.significant().take(1).collect(),
        GroupKind::Operation
        | GroupKind::Case
        | GroupKind::Comparison
        | GroupKind::IdentifierList
        | GroupKind::Where
        | GroupKind::Statement => node.sublists().collect(),
    };
    Ok(children)
}

/// `a`, `a.b`, `a.b.*`: names joined by dots with nothing else
fn is_name_chain(body: &[Node]) -> bool {
    body.iter()
        .all(|n| n.is_name() || n.is_wildcard() || n.is_punctuation(".") || n.is_negligible())
}

/// Build the output column for one projected expression
///
/// An alias names the column; an unaliased column reference keeps its own
/// name; anything else is named after its text.
pub fn projected_column<S>(node: &Node, subqueries: &S) -> Result<Column>
where
    S: SubqueryLineage + ?Sized,
{
    let sources = extract_source_columns(node, subqueries)?;
    if !node.is_kind(GroupKind::Identifier) {
        let name = node.to_string();
        return Ok(Column::with_sources(
            name.trim(),
            sources,
            ColumnExpression::Derived(node.clone()),
        ));
    }

    let body = identifier_body(node);
    if let Some(alias) = get_alias(node) {
        return Ok(Column::with_sources(
            &alias,
            sources,
            ColumnExpression::Derived(expression_of(body)),
        ));
    }
    if is_name_chain(body) {
        if let (Some(name), _) = get_identifier_name_and_parent(node) {
            return Ok(Column::with_sources(&name, sources, ColumnExpression::Direct));
        }
    }
    // `expr AS` without an alias
    let text: String = body.iter().map(ToString::to_string).collect();
    Ok(Column::with_sources(
        text.trim(),
        sources,
        ColumnExpression::Derived(expression_of(body)),
    ))
}

fn expression_of(body: &[Node]) -> Node {
    let significant: Vec<&Node> = body.iter().filter(|n| !n.is_negligible()).collect();
    match significant.as_slice() {
        [single] => (*single).clone(),
        _ => Node::Group(crate::grammar::Group::new(
            GroupKind::Identifier,
            body.iter()
                .filter(|n| !n.is_whitespace())
                .cloned()
                .collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqlDialect;
    use crate::grammar::extension::list_items;
    use crate::grammar::parse;
    use pretty_assertions::assert_eq;

    struct NoSubqueries;

    impl SubqueryLineage for NoSubqueries {
        fn subquery_origins(&self, _query: &str) -> Result<Vec<ColumnQualifier>> {
            Ok(Vec::new())
        }
    }

    /// Answers every subquery with `(x, <first word after FROM>)`
    struct FromTable;

    impl SubqueryLineage for FromTable {
        fn subquery_origins(&self, query: &str) -> Result<Vec<ColumnQualifier>> {
            let table = query
                .split_whitespace()
                .skip_while(|w| !w.eq_ignore_ascii_case("from"))
                .nth(1)
                .map(str::to_string);
            Ok(vec![ColumnQualifier::new("x", table)])
        }
    }

    fn projection(sql: &str) -> Vec<Node> {
        let statement = parse(sql, SqlDialect::Generic).unwrap().remove(0);
        let list = statement
            .significant()
            .nth(1)
            .cloned()
            .unwrap();
        list_items(&list).into_iter().cloned().collect()
    }

    fn refs(pairs: &[(&str, Option<&str>)]) -> Vec<ColumnQualifier> {
        pairs
            .iter()
            .map(|(column, qualifier)| ColumnQualifier::new(*column, qualifier.map(str::to_string)))
            .collect()
    }

    fn sources_of(sql: &str) -> Vec<ColumnQualifier> {
        let items = projection(sql);
        extract_source_columns(&items[0], &NoSubqueries).unwrap()
    }

    #[test]
    fn test_qualified_reference() {
        assert_eq!(sources_of("SELECT a.col1 AS c FROM t"), refs(&[("col1", Some("a"))]));
    }

    #[test]
    fn test_function_arguments_in_order() {
        assert_eq!(
            sources_of("SELECT concat(col2, b.col1, 'x') FROM t"),
            refs(&[("col2", None), ("col1", Some("b"))])
        );
    }

    #[test]
    fn test_count_variants() {
        assert_eq!(sources_of("SELECT count(*) FROM t"), refs(&[]));
        assert_eq!(sources_of("SELECT count(1) FROM t"), refs(&[]));
        assert_eq!(
            sources_of("SELECT count(DISTINCT col1) FROM t"),
            refs(&[("col1", None)])
        );
    }

    #[test]
    fn test_boolean_function_argument() {
        assert_eq!(
            sources_of("SELECT if(col1 = 'foo' AND col2 = 'bar', 1, 0) AS flag FROM t"),
            refs(&[("col1", None), ("col2", None)])
        );
    }

    #[test]
    fn test_nested_casts_reduce_to_operand() {
        for depth in 1..5 {
            let mut expr = "col1".to_string();
            for _ in 0..depth {
                expr = format!("CAST({expr} AS string)");
            }
            let sql = format!("SELECT {expr} AS c FROM t");
            assert_eq!(sources_of(&sql), refs(&[("col1", None)]), "{sql}");
        }
    }

    #[test]
    fn test_cast_to_decimal_with_precision() {
        assert_eq!(
            sources_of("SELECT cast(col1 AS decimal(18, 0)) AS c FROM t"),
            refs(&[("col1", None)])
        );
        assert_eq!(
            sources_of("SELECT col1::decimal(18, 0) AS c FROM t"),
            refs(&[("col1", None)])
        );
    }

    #[test]
    fn test_cast_of_comparison() {
        assert_eq!(
            sources_of("SELECT cast(col1 = 1 AS int) col1 FROM t"),
            refs(&[("col1", None)])
        );
    }

    #[test]
    fn test_cast_of_constant() {
        assert_eq!(sources_of("SELECT cast('2020-01-01' AS date) AS d FROM t"), refs(&[]));
    }

    #[test]
    fn test_case_branches() {
        assert_eq!(
            sources_of("SELECT CASE WHEN col1 = 1 THEN col2 ELSE col3 + 1 END AS c FROM t"),
            refs(&[("col1", None), ("col2", None), ("col3", None)])
        );
    }

    #[test]
    fn test_window_call() {
        assert_eq!(
            sources_of(
                "SELECT row_number() OVER (PARTITION BY col1 ORDER BY col2 DESC) AS rn FROM t"
            ),
            refs(&[("col1", None), ("col2", None)])
        );
    }

    #[test]
    fn test_parenthesized_arithmetic() {
        assert_eq!(
            sources_of("SELECT (col1 + col2) * col3 AS c FROM t"),
            refs(&[("col1", None), ("col2", None), ("col3", None)])
        );
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(sources_of("SELECT * FROM t"), refs(&[("*", None)]));
        assert_eq!(sources_of("SELECT t.* FROM t"), refs(&[("*", Some("t"))]));
    }

    #[test]
    fn test_scalar_subquery_reports_origins() {
        let items = projection(
            "SELECT CASE WHEN (SELECT avg(x) FROM t3) > 0 AND col2 = 1 THEN 1 END AS c FROM t4",
        );
        let sources = extract_source_columns(&items[0], &FromTable).unwrap();
        assert_eq!(sources, refs(&[("x", Some("t3")), ("col2", None)]));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let items = projection("SELECT coalesce(a.col1, b.col2) + 1 AS c FROM t");
        let first = extract_source_columns(&items[0], &NoSubqueries).unwrap();
        let second = extract_source_columns(&items[0], &NoSubqueries).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_projected_column_names() {
        let items = projection("SELECT col1, b.col2 AS x, max(col3), col4 AS, 'k' AS k FROM t");
        let names: Vec<String> = items
            .iter()
            .map(|item| projected_column(item, &NoSubqueries).unwrap().raw_name().to_string())
            .collect();
        assert_eq!(names, vec!["col1", "x", "max(col3)", "col4", "k"]);

        let direct = projected_column(&items[0], &NoSubqueries).unwrap();
        assert_eq!(direct.expression(), &ColumnExpression::Direct);
        let dangling = projected_column(&items[3], &NoSubqueries).unwrap();
        assert_eq!(dangling.source_columns(), refs(&[("col4", None)]).as_slice());
    }
}
