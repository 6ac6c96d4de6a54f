//! SQL dialect support

use sqlparser::dialect::{
    BigQueryDialect, Dialect, GenericDialect, HiveDialect, MySqlDialect, PostgreSqlDialect,
    SnowflakeDialect,
};
use std::str::FromStr;

/// Supported SQL dialects
///
/// The dialect only drives tokenization (quoting rules, comment styles);
/// the lineage grammar itself is dialect agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    #[default]
    Generic,
    Hive,
    PostgreSQL,
    MySQL,
    Snowflake,
    BigQuery,
}

impl SqlDialect {
    /// Get the sqlparser dialect for tokenizing and parsing
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Hive => Box::new(HiveDialect {}),
            SqlDialect::PostgreSQL => Box::new(PostgreSqlDialect {}),
            SqlDialect::MySQL => Box::new(MySqlDialect {}),
            SqlDialect::Snowflake => Box::new(SnowflakeDialect {}),
            SqlDialect::BigQuery => Box::new(BigQueryDialect {}),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" | "ansi" | "ansi-sql" => Ok(SqlDialect::Generic),
            "hive" | "sparksql" | "spark" => Ok(SqlDialect::Hive),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSQL),
            "mysql" | "mysql8" => Ok(SqlDialect::MySQL),
            "snowflake" => Ok(SqlDialect::Snowflake),
            "bigquery" | "bq" => Ok(SqlDialect::BigQuery),
            _ => Err(format!(
                "Unknown dialect: '{}'. Supported dialects: generic, hive, postgresql, mysql, snowflake, bigquery.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::Generic => write!(f, "generic"),
            SqlDialect::Hive => write!(f, "hive"),
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::MySQL => write!(f, "mysql"),
            SqlDialect::Snowflake => write!(f, "snowflake"),
            SqlDialect::BigQuery => write!(f, "bigquery"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialect_names() {
        assert_eq!("Hive".parse::<SqlDialect>(), Ok(SqlDialect::Hive));
        assert_eq!("pg".parse::<SqlDialect>(), Ok(SqlDialect::PostgreSQL));
        assert_eq!("ansi".parse::<SqlDialect>(), Ok(SqlDialect::Generic));
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for dialect in [
            SqlDialect::Generic,
            SqlDialect::Hive,
            SqlDialect::PostgreSQL,
            SqlDialect::MySQL,
            SqlDialect::Snowflake,
            SqlDialect::BigQuery,
        ] {
            assert_eq!(dialect.to_string().parse::<SqlDialect>(), Ok(dialect));
        }
    }
}
