//! Staged CSV ingestion
//!
//! A run reads a CSV file, normalizes it against a [`TableSchema`], and moves
//! the surviving rows into the target table through a scratch staging table:
//!
//! 1. [`normalize`] - read, clean, filter and coerce rows
//! 2. [`staging`] - create or clear the staging table
//! 3. [`loader`] - bulk insert rows into staging
//! 4. [`dedupe`] - drop staging rows whose key already exists in the target
//! 5. [`upsert`] - insert-or-ignore from staging into the target
//!
//! [`pipeline::run`] drives the steps inside a single transaction.
//!
//! [`TableSchema`]: crate::models::TableSchema

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::database::DatabaseError;
use crate::models::DEFAULT_DELIMITER;
use crate::validation::ValidationError;

pub mod codec;
pub mod dedupe;
pub mod dialect;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod staging;
pub mod upsert;

pub use codec::ArrayCodec;
pub use dialect::{EmbeddedBackend, ServerBackend, StagingDialect, StagingTable, dialect_for};
pub use normalize::{load_and_normalize, normalize, read_raw_rows};
pub use pipeline::{
    IngestFailure, IngestReport, IngestStep, PipelineState, run, target_row_count,
};

/// Default number of rows per multi-row INSERT
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Error type for ingest operations
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV reader error that prevents any progress
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Input file has no header row
    #[error("Missing header row in {}", .0.display())]
    MissingHeader(PathBuf),

    /// Table description failed validation
    #[error("Invalid table schema: {0}")]
    InvalidSchema(#[from] ValidationError),

    /// A required or conflict column is not a data column of the table
    #[error("Column '{column}' is not a data column of table '{table}'")]
    UnknownColumn { column: String, table: String },

    /// Connection reports a dialect with no staging support
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Pipeline state machine rejected a transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: pipeline::PipelineState,
        to: pipeline::PipelineState,
    },

    /// Database operation failed
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Tunables for an ingest run
///
/// Loaded from the `[ingest]` section of `.tea-ingest.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Default array delimiter (default: `;`)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Rows per multi-row INSERT (default: 500)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Schema that holds staging tables on backends with schemas (default: "staging")
    #[serde(default = "default_staging_schema")]
    pub staging_schema: String,
    /// Suffix appended to the target table name (default: "_staging")
    #[serde(default = "default_staging_suffix")]
    pub staging_suffix: String,
}

fn default_delimiter() -> char {
    DEFAULT_DELIMITER
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_staging_schema() -> String {
    "staging".to_string()
}

fn default_staging_suffix() -> String {
    "_staging".to_string()
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            batch_size: default_batch_size(),
            staging_schema: default_staging_schema(),
            staging_suffix: default_staging_suffix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = IngestOptions::default();
        assert_eq!(options.delimiter, ';');
        assert_eq!(options.batch_size, 500);
        assert_eq!(options.staging_schema, "staging");
        assert_eq!(options.staging_suffix, "_staging");
    }

    #[test]
    fn test_options_partial_toml() {
        let options: IngestOptions = toml::from_str("batch_size = 50\ndelimiter = \"|\"").unwrap();
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.delimiter, '|');
        assert_eq!(options.staging_suffix, "_staging");
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::UnknownColumn {
            column: "flavour".to_string(),
            table: "tea_profiles".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Column 'flavour' is not a data column of table 'tea_profiles'"
        );

        let err = IngestError::UnsupportedDialect("sqlite".to_string());
        assert!(err.to_string().contains("sqlite"));
    }
}
