//! Database management CLI commands

use std::path::PathBuf;

use super::{catalog_entry, connect, runtime};
use crate::cli::error::CliError;
use crate::database::config::{BackendKind, DEFAULT_DUCKDB_FILENAME, IngestConfig};
use crate::ingest::dialect_for;

/// Database init arguments
#[derive(Debug, Clone)]
pub struct DbInitArgs {
    /// Directory holding `.tea-ingest.toml`
    pub dir: PathBuf,
    /// Database backend type
    pub backend: String,
    /// PostgreSQL connection string (for postgres backend)
    pub connection_string: Option<String>,
    /// Table to create
    pub table: String,
}

/// Write the configuration (if missing) and create the target table
pub fn handle_db_init(args: &DbInitArgs) -> Result<(), CliError> {
    let dir = &args.dir;

    if !dir.exists() {
        return Err(CliError::FileNotFound(dir.clone()));
    }

    let entry = catalog_entry(&args.table)?;

    let config_path = IngestConfig::path_in(dir);
    let config = if config_path.exists() {
        IngestConfig::load(dir)?
    } else {
        let backend: BackendKind = args
            .backend
            .parse()
            .map_err(|e: String| CliError::InvalidArgument(e))?;

        let config = match backend {
            BackendKind::DuckDb => IngestConfig::duckdb(DEFAULT_DUCKDB_FILENAME),
            BackendKind::Postgres => {
                let conn_str = args.connection_string.as_ref().ok_or_else(|| {
                    CliError::InvalidArgument(
                        "PostgreSQL requires --connection-string argument".to_string(),
                    )
                })?;
                IngestConfig::postgres(conn_str)
            }
        };

        config.save(dir)?;
        println!("Created {}", config_path.display());
        config
    };

    let rt = runtime()?;
    rt.block_on(async {
        let conn = connect(&config, dir).await?;
        let dialect = dialect_for(conn.dialect_name())?;

        conn.execute_batch(&dialect.create_table_sql(&entry.schema, &entry.conflict))
            .await?;

        println!(
            "Initialized table '{}' on {} backend",
            entry.schema.name, config.database.backend
        );
        Ok::<(), CliError>(())
    })
}
