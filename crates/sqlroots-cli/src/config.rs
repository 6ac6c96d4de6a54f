//! Configuration file handling

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::args::{LineageArgs, LineageLevel, OutputFormat};

pub const CONFIG_FILE: &str = "sqlroots.toml";

/// Configuration for sqlroots
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// SQL dialect
    #[serde(default)]
    pub dialect: Option<String>,

    /// Database assumed for unqualified table names
    #[serde(default)]
    pub default_database: Option<String>,

    /// Schema assumed for unqualified table names
    #[serde(default)]
    pub default_schema: Option<String>,

    /// DDL file paths or patterns
    #[serde(default)]
    pub schema: Vec<String>,

    /// SQL file patterns to analyze
    #[serde(default)]
    pub files: Vec<String>,

    /// Output format (human, json)
    #[serde(default)]
    pub format: Option<OutputFormat>,

    /// Lineage level (table, column)
    #[serde(default)]
    pub level: Option<LineageLevel>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&contents).wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).into_diagnostic()
    }

    /// Try to find and load sqlroots.toml in the current directory or its parents
    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join(CONFIG_FILE);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "using config file");
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(mut self, args: &LineageArgs) -> Self {
        if !args.files.is_empty() {
            self.files = args.files.iter().map(|p| p.display().to_string()).collect();
        }

        if !args.schema.is_empty() {
            self.schema = args.schema.iter().map(|p| p.display().to_string()).collect();
        }

        if args.dialect.is_some() {
            self.dialect.clone_from(&args.dialect);
        }

        if args.default_database.is_some() {
            self.default_database.clone_from(&args.default_database);
        }

        if args.default_schema.is_some() {
            self.default_schema.clone_from(&args.default_schema);
        }

        if args.format.is_some() {
            self.format = args.format;
        }

        if args.level.is_some() {
            self.level = args.level;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_parse_config() {
        let config = Config::from_toml(
            r#"
            dialect = "hive"
            default_database = "db"
            schema = ["ddl/*.sql"]
            files = ["etl/**/*.sql"]
            format = "json"
            level = "column"
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect.as_deref(), Some("hive"));
        assert_eq!(config.default_database.as_deref(), Some("db"));
        assert_eq!(config.default_schema, None);
        assert_eq!(config.schema, vec!["ddl/*.sql"]);
        assert_eq!(config.format, Some(OutputFormat::Json));
        assert_eq!(config.level, Some(LineageLevel::Column));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("dialekt = \"hive\"").is_err());
    }

    #[test]
    fn test_args_override_config() {
        let config = Config {
            dialect: Some("hive".to_string()),
            files: vec!["a.sql".to_string()],
            level: Some(LineageLevel::Column),
            ..Config::default()
        };
        let args = LineageArgs {
            files: vec![PathBuf::from("b.sql")],
            dialect: Some("mysql".to_string()),
            default_schema: Some("sch".to_string()),
            ..LineageArgs::default()
        };

        let merged = config.merge_with_args(&args);
        assert_eq!(merged.files, vec!["b.sql"]);
        assert_eq!(merged.dialect.as_deref(), Some("mysql"));
        assert_eq!(merged.default_schema.as_deref(), Some("sch"));
        assert_eq!(merged.level, Some(LineageLevel::Column));
    }
}
