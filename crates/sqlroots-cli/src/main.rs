//! sqlroots CLI - SQL lineage tool

mod args;
mod config;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use sqlroots_core::analyzer::LineageResult;
use sqlroots_core::{grammar, Catalog, LineageAnalyzer, SchemaBuilder, SqlDialect, TableMetadata};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, LineageArgs};
use crate::config::Config;
use crate::output::OutputFormatter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(args) {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(2)
        }
    }
}

/// RUST_LOG wins over -v/-q
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<bool> {
    match args.command {
        Command::Lineage(lineage) => run_lineage(&lineage),
        Command::Parse { file, dialect } => {
            let dialect = parse_dialect(&dialect)?;
            let content = read_file(&file)?;
            for (i, statement) in grammar::parse(&content, dialect)?.iter().enumerate() {
                println!("Statement {}:", i + 1);
                println!("{}", statement.tree());
            }
            Ok(false)
        }
    }
}

fn run_lineage(args: &LineageArgs) -> Result<bool> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::find_and_load()?.unwrap_or_default(),
    };
    let config = config.merge_with_args(args);

    let dialect = parse_dialect(config.dialect.as_deref().unwrap_or("generic"))?;
    let metadata = TableMetadata::new(
        config.default_database.clone(),
        config.default_schema.clone(),
    );
    let catalog = load_schema(&config.schema, dialect)?;

    let files = expand_patterns(&config.files)?;
    if files.is_empty() {
        miette::bail!("No SQL files specified. Pass files as arguments or configure them in sqlroots.toml");
    }

    let formatter = OutputFormatter::new(
        config.format.unwrap_or_default(),
        config.level.unwrap_or_default(),
        args.include_subquery,
    );
    let analyzer = LineageAnalyzer::new()
        .with_dialect(dialect)
        .with_metadata(metadata)
        .with_schema(&catalog);

    let mut has_errors = false;
    for file in &files {
        let content = read_file(file)?;
        let result = if args.keep_going {
            let mut statements = Vec::new();
            let outcomes = analyzer
                .analyze_each(&content)
                .wrap_err_with(|| format!("failed to analyze {}", file.display()))?;
            for (i, outcome) in outcomes.into_iter().enumerate() {
                match outcome {
                    Ok(statement) => statements.push(statement),
                    Err(e) => {
                        has_errors = true;
                        let report = miette::Report::new(e)
                            .wrap_err(format!("{}: statement #{} skipped", file.display(), i + 1));
                        eprintln!("{:?}", report);
                    }
                }
            }
            LineageResult::new(statements)
        } else {
            analyzer
                .analyze(&content)
                .wrap_err_with(|| format!("failed to analyze {}", file.display()))?
        };
        formatter.print_lineage(&file.display().to_string(), &result)?;
    }

    Ok(has_errors)
}

fn parse_dialect(name: &str) -> Result<SqlDialect> {
    name.parse().map_err(|e: String| miette::miette!(e))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", path.display()))
}

/// Build a catalog from DDL files
fn load_schema(patterns: &[String], dialect: SqlDialect) -> Result<Catalog> {
    let mut builder = SchemaBuilder::new().with_dialect(dialect);
    for path in expand_patterns(patterns)? {
        let content = read_file(&path)?;
        let registered = builder
            .parse(&content)
            .wrap_err_with(|| format!("failed to read schema {}", path.display()))?;
        tracing::info!(path = %path.display(), registered, "loaded schema");
    }
    if builder.skipped() > 0 {
        tracing::warn!(
            skipped = builder.skipped(),
            "some schema statements could not be parsed"
        );
    }
    Ok(builder.build())
}

/// Expand glob patterns; plain paths are kept as given
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains(['*', '?', '[']) {
            let matches = glob::glob(pattern)
                .into_diagnostic()
                .wrap_err_with(|| format!("invalid pattern {pattern}"))?;
            for path in matches {
                paths.push(path.into_diagnostic()?);
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_paths_are_kept() {
        let paths = expand_patterns(&["a.sql".to_string(), "dir/b.sql".to_string()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.sql"), PathBuf::from("dir/b.sql")]);
    }

    #[test]
    fn test_unknown_dialect() {
        assert!(parse_dialect("oracle").is_err());
        assert_eq!(parse_dialect("spark").unwrap(), SqlDialect::Hive);
    }
}
