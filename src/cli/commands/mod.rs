//! CLI command implementations

pub mod db;
pub mod ingest;
pub mod query;

use std::path::Path;

use crate::cli::error::CliError;
use crate::database::IngestConnection;
use crate::database::config::{BackendKind, IngestConfig};
use crate::models::TableSchema;
use crate::models::tea_profile::{
    TEA_PROFILES_TABLE, required_tea_profile_fields, tea_profile_conflict_columns,
    tea_profiles_schema,
};

/// Schema, required columns and conflict columns of a known table
pub(crate) struct TableCatalogEntry {
    pub schema: TableSchema,
    pub required: Vec<String>,
    pub conflict: Vec<String>,
}

/// Look up a built-in table by name
pub(crate) fn catalog_entry(table: &str) -> Result<TableCatalogEntry, CliError> {
    match table {
        TEA_PROFILES_TABLE => Ok(TableCatalogEntry {
            schema: tea_profiles_schema(),
            required: required_tea_profile_fields(),
            conflict: tea_profile_conflict_columns(),
        }),
        other => Err(CliError::InvalidArgument(format!(
            "Unknown table '{}'. Known tables: {}",
            other, TEA_PROFILES_TABLE
        ))),
    }
}

/// Open a connection to the configured backend
pub(crate) async fn connect(
    config: &IngestConfig,
    dir: &Path,
) -> Result<Box<dyn IngestConnection>, CliError> {
    match config.database.backend {
        BackendKind::DuckDb => {
            #[cfg(feature = "duckdb-backend")]
            {
                let db_path = config.duckdb_path(dir);
                let conn = crate::database::DuckDBConnection::new(&db_path)?;
                tracing::debug!(path = %db_path.display(), "Opened DuckDB database");
                Ok(Box::new(conn))
            }
            #[cfg(not(feature = "duckdb-backend"))]
            {
                let _ = dir;
                Err(CliError::InvalidArgument(
                    "DuckDB backend not enabled. Build with --features duckdb-backend".to_string(),
                ))
            }
        }
        BackendKind::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                let conn_str = config.postgres_url().ok_or_else(|| {
                    CliError::InvalidArgument(
                        "PostgreSQL connection string not configured".to_string(),
                    )
                })?;
                let conn = crate::database::PostgresConnection::new(conn_str).await?;
                tracing::debug!(
                    connection = %conn.connection_string_masked(),
                    "Connected to PostgreSQL"
                );
                Ok(Box::new(conn))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(CliError::InvalidArgument(
                    "PostgreSQL backend not enabled. Build with --features postgres-backend"
                        .to_string(),
                ))
            }
        }
    }
}

/// Create a current-thread runtime for a command
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry() {
        let entry = catalog_entry("tea_profiles").unwrap();
        assert_eq!(entry.schema.name, "tea_profiles");
        assert_eq!(entry.conflict, vec!["name".to_string()]);
        assert!(entry.required.contains(&"liquor_taste".to_string()));

        assert!(matches!(
            catalog_entry("coffee_profiles"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
