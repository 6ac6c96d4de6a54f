//! Output formatting

use std::fmt::Write;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use sqlroots_core::analyzer::{ColumnPath, LineageResult, StatementLineage};

use crate::args::{LineageLevel, OutputFormat};

/// Output formatter for lineage results
pub struct OutputFormatter {
    format: OutputFormat,
    level: LineageLevel,
    include_subquery: bool,
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: &'a str,
    source_tables: Vec<String>,
    target_tables: Vec<String>,
    intermediate_tables: Vec<String>,
    statements: Vec<StatementReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column_lineage: Option<Vec<PathReport>>,
}

#[derive(Serialize)]
struct StatementReport {
    read: Vec<String>,
    write: Vec<String>,
    cte: Vec<String>,
}

/// One column path, ordered from source to target
#[derive(Serialize)]
struct PathReport {
    source: String,
    target: String,
    path: Vec<String>,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, level: LineageLevel, include_subquery: bool) -> Self {
        Self {
            format,
            level,
            include_subquery,
        }
    }

    /// Print the lineage of one file in the configured format
    pub fn print_lineage(&self, file_name: &str, result: &LineageResult) -> Result<()> {
        let rendered = self.render(file_name, result)?;
        print!("{rendered}");
        Ok(())
    }

    pub fn render(&self, file_name: &str, result: &LineageResult) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(self.render_human(file_name, result)),
            OutputFormat::Json => self.render_json(file_name, result),
        }
    }

    fn paths(&self, result: &LineageResult) -> Vec<ColumnPath> {
        result.column_lineage(!self.include_subquery)
    }

    fn render_human(&self, file_name: &str, result: &LineageResult) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== {file_name} ==");

        match self.level {
            LineageLevel::Table => {
                for (i, statement) in result.statements().iter().enumerate() {
                    let report = statement_report(statement);
                    let _ = writeln!(out, "Statement #{}:", i + 1);
                    let _ = writeln!(out, "    table read: [{}]", report.read.join(", "));
                    let _ = writeln!(out, "    table write: [{}]", report.write.join(", "));
                    let _ = writeln!(out, "    table cte: [{}]", report.cte.join(", "));
                }
                let _ = writeln!(out, "==========");
                let _ = writeln!(out, "Summary:");
                let sections = [
                    ("Source Tables", names(result.source_tables())),
                    ("Target Tables", names(result.target_tables())),
                    ("Intermediate Tables", names(result.intermediate_tables())),
                ];
                for (title, tables) in sections {
                    let _ = writeln!(out, "{title}:");
                    for table in tables {
                        let _ = writeln!(out, "    {table}");
                    }
                }
            }
            LineageLevel::Column => {
                for path in self.paths(result) {
                    let _ = writeln!(out, "{path}");
                }
            }
        }
        out
    }

    fn render_json(&self, file_name: &str, result: &LineageResult) -> Result<String> {
        let column_lineage = (self.level == LineageLevel::Column).then(|| {
            self.paths(result)
                .iter()
                .map(|path| PathReport {
                    source: path.source().map(ToString::to_string).unwrap_or_default(),
                    target: path.target().map(ToString::to_string).unwrap_or_default(),
                    path: path.columns().iter().map(ToString::to_string).collect(),
                })
                .collect()
        });
        let report = FileReport {
            file: file_name,
            source_tables: names(result.source_tables()),
            target_tables: names(result.target_tables()),
            intermediate_tables: names(result.intermediate_tables()),
            statements: result.statements().iter().map(statement_report).collect(),
            column_lineage,
        };
        let mut json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        json.push('\n');
        Ok(json)
    }
}

fn statement_report(statement: &StatementLineage) -> StatementReport {
    StatementReport {
        read: statement.read().iter().map(ToString::to_string).collect(),
        write: statement.write().iter().map(ToString::to_string).collect(),
        cte: statement.ctes().iter().map(ToString::to_string).collect(),
    }
}

fn names<T: ToString>(items: Vec<T>) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}
