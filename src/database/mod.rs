//! Database backend abstraction for the ingest pipeline
//!
//! This module provides the connection layer the pipeline runs against:
//! - DuckDB: Embedded database for local runs and tests
//! - PostgreSQL: For server deployments
//!
//! A connection only exposes what the pipeline needs: its dialect name,
//! explicit transaction control, raw statements and parameterized bulk
//! statements. All dialect-specific SQL lives in [`crate::ingest::dialect`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::CellValue;

// Re-export implementations based on features
#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDBConnection;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresConnection;

pub use config::IngestConfig;

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read the first column of the first row as an integer
    ///
    /// Convenience for `SELECT COUNT(*) ...` style queries.
    pub fn scalar_i64(&self) -> Option<i64> {
        let column = self.columns.first()?;
        let value = self.rows.first()?.get(column)?;
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    }
}

/// Transactional connection the ingest pipeline runs against
///
/// Implementations hold exactly one session. `begin`, `commit` and
/// `rollback` map to the SQL statements of the same name; every statement
/// issued between `begin` and `commit` runs in that transaction.
#[async_trait(?Send)]
pub trait IngestConnection {
    /// Dialect name of the backend ("postgresql" or "duckdb")
    ///
    /// The pipeline resolves all dialect-specific behavior from this value at
    /// run time.
    fn dialect_name(&self) -> &'static str;

    /// Open a transaction
    async fn begin(&self) -> DatabaseResult<()>;

    /// Commit the open transaction
    async fn commit(&self) -> DatabaseResult<()>;

    /// Roll back the open transaction
    async fn rollback(&self) -> DatabaseResult<()>;

    /// Execute one or more statements that take no parameters
    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()>;

    /// Execute a single parameterized statement
    ///
    /// # Arguments
    /// * `sql` - SQL statement using the dialect's placeholder syntax
    /// * `params` - Parameter values, one per placeholder
    ///
    /// # Returns
    /// Number of rows affected
    async fn execute(&self, sql: &str, params: &[CellValue]) -> DatabaseResult<u64>;

    /// Execute a SQL query and return results
    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult>;

    /// Check if database is healthy and accessible
    async fn health_check(&self) -> DatabaseResult<bool> {
        let result = self.execute_query("SELECT 1 AS healthy").await?;
        Ok(!result.rows.is_empty())
    }
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut write_all = || -> csv::Result<()> {
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(result.columns.iter().map(|col| {
                match row.get(col).unwrap_or(&serde_json::Value::Null) {
                    serde_json::Value::Null => String::new(),
                    other => display_value(other),
                }
            }))?;
        }
        writer.flush()?;
        Ok(())
    };

    if let Err(e) = write_all() {
        tracing::warn!("CSV formatting failed: {}", e);
    }

    writer
        .into_inner()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| display_value(row.get(col).unwrap_or(&serde_json::Value::Null)))
                .collect()
        })
        .collect();

    // Calculate column widths
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.len());
        }
    }

    let pad = |values: &[String]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", v, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut output = String::new();
    output.push_str(&pad(&result.columns));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &cells {
        output.push_str(&pad(row));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}
