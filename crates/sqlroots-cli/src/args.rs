//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "sqlroots")]
#[command(author, version, about = "SQL table and column lineage tool")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Trace table and column lineage through SQL files
    Lineage(LineageArgs),

    /// Parse SQL and display the grouped token tree (for debugging)
    Parse {
        /// SQL file to parse
        file: PathBuf,

        /// SQL dialect
        #[arg(short, long, default_value = "generic")]
        dialect: String,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct LineageArgs {
    /// SQL files to analyze (supports glob patterns)
    pub files: Vec<PathBuf>,

    /// Configuration file (defaults to sqlroots.toml in this or a parent directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// DDL files used to expand `*` (supports glob patterns)
    #[arg(short, long = "schema", value_name = "FILE")]
    pub schema: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long)]
    pub dialect: Option<String>,

    /// Database assumed for unqualified table names
    #[arg(long, value_name = "NAME")]
    pub default_database: Option<String>,

    /// Schema assumed for unqualified table names
    #[arg(long, value_name = "NAME")]
    pub default_schema: Option<String>,

    /// Lineage level to report
    #[arg(short, long, value_enum)]
    pub level: Option<LineageLevel>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Report paths that end in subquery columns
    #[arg(long)]
    pub include_subquery: bool,

    /// Report failing statements and continue with the rest
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineageLevel {
    /// Tables read and written
    #[default]
    Table,
    /// Column paths from source to target
    Column,
}
