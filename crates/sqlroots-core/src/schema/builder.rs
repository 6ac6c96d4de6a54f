//! Schema builder - collects table column lists from DDL

use sqlparser::ast::{
    AlterTableOperation, Expr, ObjectName, Query, Select, SelectItem, SetExpr, Statement,
    TableFactor,
};
use sqlparser::parser::Parser;
use tracing::debug;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::grammar;
use crate::schema::Catalog;

/// Builder for constructing a Catalog from schema definitions
///
/// Understands `CREATE TABLE` (with a column list or `AS SELECT`),
/// `CREATE VIEW` and the column-changing forms of `ALTER TABLE`.
pub struct SchemaBuilder {
    catalog: Catalog,
    dialect: SqlDialect,
    skipped: usize,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            dialect: SqlDialect::default(),
            skipped: 0,
        }
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Parse schema definitions into the catalog
    ///
    /// Returns the number of statements that defined or changed a table.
    /// Statements sqlparser cannot handle are skipped.
    pub fn parse(&mut self, sql: &str) -> Result<usize> {
        let dialect = self.dialect.parser_dialect();
        match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) => {
                let mut registered = 0;
                for statement in &statements {
                    registered += usize::from(self.process_statement(statement));
                }
                Ok(registered)
            }
            Err(e) => {
                debug!(error = %e, "schema does not parse as a whole, trying statement by statement");
                self.parse_statements_individually(sql)
            }
        }
    }

    fn parse_statements_individually(&mut self, sql: &str) -> Result<usize> {
        let dialect = self.dialect.parser_dialect();
        let mut registered = 0;
        for statement in grammar::parse(sql, self.dialect)? {
            let text = statement.to_string();
            match Parser::parse_sql(dialect.as_ref(), text.trim()) {
                Ok(parsed) => {
                    for statement in &parsed {
                        registered += usize::from(self.process_statement(statement));
                    }
                }
                Err(e) => {
                    self.skipped += 1;
                    debug!(error = %e, statement = text.trim(), "skipping schema statement");
                }
            }
        }
        Ok(registered)
    }

    fn process_statement(&mut self, statement: &Statement) -> bool {
        match statement {
            Statement::CreateTable(create) => {
                let columns = if create.columns.is_empty() {
                    create
                        .query
                        .as_deref()
                        .map(|query| self.query_columns(query))
                        .unwrap_or_default()
                } else {
                    create.columns.iter().map(|c| c.name.value.clone()).collect()
                };
                self.catalog.add_table(&object_name(&create.name), columns);
                true
            }
            Statement::CreateView {
                name,
                columns,
                query,
                ..
            } => {
                let columns = if columns.is_empty() {
                    self.query_columns(query)
                } else {
                    columns.iter().map(|c| c.name.value.clone()).collect()
                };
                self.catalog.add_table(&object_name(name), columns);
                true
            }
            Statement::AlterTable {
                name, operations, ..
            } => self.process_alter_table(&object_name(name), operations),
            _ => false,
        }
    }

    fn process_alter_table(&mut self, name: &str, operations: &[AlterTableOperation]) -> bool {
        if !self.catalog.table_exists(name) {
            debug!(table = name, "ALTER TABLE on a table not defined earlier");
            return false;
        }

        for operation in operations {
            match operation {
                AlterTableOperation::AddColumn { column_def, .. } => {
                    if let Some(columns) = self.catalog.table_columns_mut(name) {
                        columns.push(column_def.name.value.clone());
                    }
                }
                AlterTableOperation::DropColumn { column_name, .. } => {
                    if let Some(columns) = self.catalog.table_columns_mut(name) {
                        columns.retain(|c| !c.eq_ignore_ascii_case(&column_name.value));
                    }
                }
                AlterTableOperation::RenameColumn {
                    old_column_name,
                    new_column_name,
                } => {
                    if let Some(columns) = self.catalog.table_columns_mut(name) {
                        for column in columns.iter_mut() {
                            if column.eq_ignore_ascii_case(&old_column_name.value) {
                                *column = new_column_name.value.clone();
                            }
                        }
                    }
                }
                AlterTableOperation::RenameTable { table_name } => {
                    if let Some(columns) = self.catalog.remove_table(name) {
                        self.catalog.add_table(&object_name(table_name), columns);
                    }
                    // later operations in the same statement refer to the old name
                    return true;
                }
                _ => {}
            }
        }
        true
    }

    /// Output columns of a query, expanding `*` from tables already known
    fn query_columns(&self, query: &Query) -> Vec<String> {
        self.set_expr_columns(&query.body)
    }

    fn set_expr_columns(&self, body: &SetExpr) -> Vec<String> {
        match body {
            SetExpr::Select(select) => self.select_columns(select),
            SetExpr::Query(query) => self.query_columns(query),
            // a set operation is named after its first branch
            SetExpr::SetOperation { left, .. } => self.set_expr_columns(left),
            _ => Vec::new(),
        }
    }

    fn select_columns(&self, select: &Select) -> Vec<String> {
        let mut columns = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(Expr::Identifier(ident)) => {
                    columns.push(ident.value.clone());
                }
                SelectItem::UnnamedExpr(Expr::CompoundIdentifier(idents)) => {
                    if let Some(ident) = idents.last() {
                        columns.push(ident.value.clone());
                    }
                }
                SelectItem::UnnamedExpr(expr) => columns.push(expr.to_string()),
                SelectItem::ExprWithAlias { alias, .. } => columns.push(alias.value.clone()),
                SelectItem::Wildcard(_) => {
                    for factor in from_factors(select) {
                        if let TableFactor::Table { name, .. } = factor {
                            self.extend_known(&object_name(name), &mut columns);
                        }
                    }
                }
                SelectItem::QualifiedWildcard(qualifier, _) => {
                    let qualifier = object_name(qualifier);
                    let table = from_factors(select)
                        .find_map(|factor| match factor {
                            TableFactor::Table {
                                name,
                                alias: Some(alias),
                                ..
                            } if alias.name.value.eq_ignore_ascii_case(&qualifier) => {
                                Some(object_name(name))
                            }
                            _ => None,
                        })
                        .unwrap_or(qualifier);
                    self.extend_known(&table, &mut columns);
                }
            }
        }
        columns
    }

    fn extend_known(&self, table: &str, columns: &mut Vec<String>) {
        match self.catalog.table_columns(table) {
            Some(known) => columns.extend(known.iter().cloned()),
            None => debug!(table, "cannot expand * from an unknown table"),
        }
    }

    /// Statements that could not be parsed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Consume the builder and return the catalog
    pub fn build(self) -> Catalog {
        self.catalog
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn from_factors(select: &Select) -> impl Iterator<Item = &TableFactor> {
    select.from.iter().flat_map(|from| {
        std::iter::once(&from.relation).chain(from.joins.iter().map(|join| &join.relation))
    })
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns(catalog: &Catalog, table: &str) -> Vec<String> {
        catalog
            .table_columns(table)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    #[test]
    fn test_parse_simple_table() {
        let sql = r#"
            CREATE TABLE users (
                id SERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                email TEXT UNIQUE,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
        "#;

        let mut builder = SchemaBuilder::new();
        assert_eq!(builder.parse(sql).unwrap(), 1);
        let catalog = builder.build();
        assert_eq!(columns(&catalog, "users"), vec!["id", "name", "email", "created_at"]);
    }

    #[test]
    fn test_create_table_as_select() {
        let sql = r#"
            CREATE TABLE sch.src (a INT, b INT, c INT);
            CREATE TABLE sch.dst AS SELECT s.a, b AS bee, c + 1 AS c1 FROM sch.src s;
            CREATE TABLE sch.copy AS SELECT * FROM sch.src;
        "#;

        let mut builder = SchemaBuilder::new();
        builder.parse(sql).unwrap();
        let catalog = builder.build();
        assert_eq!(columns(&catalog, "sch.dst"), vec!["a", "bee", "c1"]);
        assert_eq!(columns(&catalog, "sch.copy"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_view_with_qualified_wildcard() {
        let sql = r#"
            CREATE TABLE orders (id INT, total INT);
            CREATE TABLE users (id INT, name TEXT);
            CREATE VIEW v AS SELECT o.*, u.name FROM orders o JOIN users u ON o.id = u.id;
            CREATE VIEW w (x, y) AS SELECT id, name FROM users;
        "#;

        let mut builder = SchemaBuilder::new();
        builder.parse(sql).unwrap();
        let catalog = builder.build();
        assert_eq!(columns(&catalog, "v"), vec!["id", "total", "name"]);
        assert_eq!(columns(&catalog, "w"), vec!["x", "y"]);
    }

    #[test]
    fn test_alter_table() {
        let sql = r#"
            CREATE TABLE t (a INT, b INT);
            ALTER TABLE t ADD COLUMN c INT;
            ALTER TABLE t DROP COLUMN a;
            ALTER TABLE t RENAME COLUMN b TO bb;
            ALTER TABLE t RENAME TO t2;
        "#;

        let mut builder = SchemaBuilder::new();
        builder.parse(sql).unwrap();
        let catalog = builder.build();
        assert!(!catalog.table_exists("t"));
        assert_eq!(columns(&catalog, "t2"), vec!["bb", "c"]);
    }

    #[test]
    fn test_parse_with_unsupported_statements() {
        let sql = r#"
            CREATE OR REPLACE PROCEDURAL LANGUAGE plpgsql;

            CREATE TABLE actor (
                actor_id integer NOT NULL,
                first_name character varying(45) NOT NULL
            );

            CREATE TABLE category (
                category_id integer NOT NULL,
                name character varying(25) NOT NULL
            );
        "#;

        let mut builder = SchemaBuilder::new().with_dialect(SqlDialect::PostgreSQL);
        assert_eq!(builder.parse(sql).unwrap(), 2);
        assert_eq!(builder.skipped(), 1);
        let catalog = builder.build();
        assert_eq!(columns(&catalog, "actor"), vec!["actor_id", "first_name"]);
        assert_eq!(columns(&catalog, "category"), vec!["category_id", "name"]);
    }
}
