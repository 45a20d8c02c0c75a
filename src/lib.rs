//! tea-ingest - staged CSV ingestion of tea profiles
//!
//! Loads semi-structured CSV files into a relational table through a scratch
//! staging table, so that re-running an ingest never duplicates rows:
//! - Row normalization (null markers, trimming, required fields, type coercion)
//! - Staging table lifecycle and batched loading
//! - Duplicate filtering and insert-or-ignore merging
//! - PostgreSQL and DuckDB backends behind one connection trait

#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod ingest;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use database::{DatabaseError, DatabaseResult, IngestConfig, IngestConnection, QueryResult};
#[cfg(feature = "duckdb-backend")]
pub use database::DuckDBConnection;
#[cfg(feature = "postgres-backend")]
pub use database::PostgresConnection;
pub use ingest::{
    ArrayCodec, IngestError, IngestOptions, IngestReport, IngestResult, IngestStep, PipelineState,
    StagingDialect, dialect_for, run,
};
pub use models::{CellValue, ColumnKind, ColumnSpec, NormalizedRow, RawRow, TableSchema};
pub use validation::{ValidationError, ValidationResult};
