//! SQL query CLI command
//!
//! Runs ad-hoc SQL against the configured database, mainly to inspect
//! ingested rows.

use std::path::PathBuf;

use super::{connect, runtime};
use crate::cli::error::CliError;
use crate::database::config::IngestConfig;
use crate::database::{OutputFormat, format_query_result};

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    /// Directory holding `.tea-ingest.toml`
    pub dir: PathBuf,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the configured database
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let config = IngestConfig::load(&args.dir)?;

    // Parse output format
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let rt = runtime()?;
    rt.block_on(async {
        let conn = connect(&config, &args.dir).await?;
        let result = conn.execute_query(&args.sql).await?;

        println!("{}", format_query_result(&result, output_format));

        // Print execution time for non-JSON formats
        if output_format != OutputFormat::Json {
            eprintln!("\nExecution time: {}ms", result.execution_time_ms);
        }
        Ok::<(), CliError>(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_is_rejected() {
        let args = QueryArgs {
            sql: "SELECT 1".to_string(),
            dir: PathBuf::from("."),
            format: "yaml".to_string(),
        };
        assert!(matches!(
            handle_query(&args),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
