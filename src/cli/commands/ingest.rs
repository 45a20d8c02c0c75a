//! CSV ingest CLI command

use std::path::PathBuf;

use super::{catalog_entry, connect, runtime};
use crate::cli::error::CliError;
use crate::database::config::IngestConfig;
use crate::ingest::{IngestReport, pipeline, target_row_count};

/// Ingest command arguments
#[derive(Debug, Clone)]
pub struct IngestArgs {
    /// CSV file to ingest
    pub file: PathBuf,
    /// Directory holding `.tea-ingest.toml`
    pub dir: PathBuf,
    /// Target table
    pub table: String,
    /// Override the configured batch size
    pub batch_size: Option<usize>,
    /// Print the report as JSON
    pub json: bool,
    /// Only ingest when the target table has no rows
    pub seed_if_empty: bool,
}

/// Run one ingest and print its report
pub fn handle_ingest(args: &IngestArgs) -> Result<(), CliError> {
    if !args.file.exists() {
        return Err(CliError::FileNotFound(args.file.clone()));
    }

    let entry = catalog_entry(&args.table)?;

    let mut config = IngestConfig::load(&args.dir)?;
    if let Some(batch_size) = args.batch_size {
        if batch_size == 0 {
            return Err(CliError::InvalidArgument(
                "--batch-size must be at least 1".to_string(),
            ));
        }
        config.ingest.batch_size = batch_size;
    }

    let rt = runtime()?;
    let report = rt.block_on(async {
        let conn = connect(&config, &args.dir).await?;

        if args.seed_if_empty {
            let existing = target_row_count(conn.as_ref(), &entry.schema.name).await?;
            if existing > 0 {
                tracing::info!(table = %entry.schema.name, existing, "Table already seeded");
                return Ok::<_, CliError>(None);
            }
        }

        Ok(Some(
            pipeline::run(
                conn.as_ref(),
                &args.file,
                &entry.schema,
                &entry.required,
                &entry.conflict,
                &config.ingest,
            )
            .await,
        ))
    })?;

    let Some(report) = report else {
        println!(
            "Table '{}' already has rows; nothing ingested",
            entry.schema.name
        );
        return Ok(());
    };

    if args.json {
        let output = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
        println!("{}", output);
    } else {
        println!("{}", format_report(&report));
    }

    match &report.failure {
        Some(failure) => Err(CliError::IngestFailed {
            state: failure.state.to_string(),
            step: failure.step.to_string(),
            reason: failure.reason.clone(),
        }),
        None => Ok(()),
    }
}

/// Human-readable summary of a report
pub fn format_report(report: &IngestReport) -> String {
    let mut lines = vec![
        format!("Run:              {}", report.run_id),
        format!("Table:            {}", report.table),
        format!("Source:           {}", report.source.display()),
        format!("State:            {}", report.state),
        format!("Rows read:        {}", report.rows_read),
        format!("Rows normalized:  {}", report.rows_normalized),
        format!("Rows staged:      {}", report.rows_staged),
        format!("Already present:  {}", report.rows_already_present),
        format!("Rows inserted:    {}", report.rows_inserted),
        format!("Duration:         {}ms", report.duration_ms),
    ];
    if let Some(failure) = &report.failure {
        lines.push(format!(
            "Failed during:    {} after {} ({})",
            failure.step, failure.state, failure.reason
        ));
    }
    lines.join("\n")
}
