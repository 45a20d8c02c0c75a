//! Ingest run orchestration
//!
//! [`run`] normalizes the input file and then performs every database step in
//! one transaction: prepare staging, load, dedupe, merge, commit. Any failure
//! rolls the transaction back. The outcome is always an [`IngestReport`];
//! errors are recorded in it rather than returned.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::database::{DatabaseError, IngestConnection};
use crate::models::TableSchema;
use crate::validation::validate_table_name;

use super::codec::ArrayCodec;
use super::dialect::dialect_for;
use super::normalize::{normalize, read_raw_rows};
use super::{IngestError, IngestOptions, IngestResult, dedupe, loader, staging, upsert};

/// Progress of an ingest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Normalizing,
    StagingPrepared,
    Loaded,
    Deduped,
    Merged,
    Committed,
    RolledBack,
}

impl PipelineState {
    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Committed | PipelineState::RolledBack)
    }

    fn successor(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::Normalizing),
            PipelineState::Normalizing => Some(PipelineState::StagingPrepared),
            PipelineState::StagingPrepared => Some(PipelineState::Loaded),
            PipelineState::Loaded => Some(PipelineState::Deduped),
            PipelineState::Deduped => Some(PipelineState::Merged),
            PipelineState::Merged => Some(PipelineState::Committed),
            PipelineState::Committed | PipelineState::RolledBack => None,
        }
    }

    /// Move to `to`, which must be the next state or `RolledBack`
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidTransition`] from terminal states and for
    /// skipped or backward steps.
    pub fn transition(self, to: PipelineState) -> IngestResult<PipelineState> {
        let allowed = !self.is_terminal()
            && (to == PipelineState::RolledBack || self.successor() == Some(to));
        if allowed {
            Ok(to)
        } else {
            Err(IngestError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Normalizing => "normalizing",
            PipelineState::StagingPrepared => "staging_prepared",
            PipelineState::Loaded => "loaded",
            PipelineState::Deduped => "deduped",
            PipelineState::Merged => "merged",
            PipelineState::Committed => "committed",
            PipelineState::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// Operation a run was performing
///
/// States only change once a step succeeds, so several steps share a state:
/// reading the file, opening the transaction and preparing staging all run
/// in `Normalizing`. The step tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStep {
    Validate,
    ReadFile,
    Begin,
    PrepareStaging,
    Load,
    Dedupe,
    Merge,
    Commit,
}

impl fmt::Display for IngestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStep::Validate => "validate",
            IngestStep::ReadFile => "read_file",
            IngestStep::Begin => "begin",
            IngestStep::PrepareStaging => "prepare_staging",
            IngestStep::Load => "load",
            IngestStep::Dedupe => "dedupe",
            IngestStep::Merge => "merge",
            IngestStep::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Why a run was rolled back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Last state reached before the failure
    pub state: PipelineState,
    /// Step that failed
    pub step: IngestStep,
    /// Error message
    pub reason: String,
}

/// Outcome of an ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Unique ID of this run
    pub run_id: Uuid,
    /// Target table
    pub table: String,
    /// Input file
    pub source: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Final state, `Committed` or `RolledBack`
    pub state: PipelineState,
    /// Records read from the file
    pub rows_read: usize,
    /// Rows left after normalization
    pub rows_normalized: usize,
    /// Rows written to staging
    pub rows_staged: u64,
    /// Staging rows removed because their key was already in the target
    pub rows_already_present: u64,
    /// Rows inserted into the target
    pub rows_inserted: u64,
    /// Set when the run was rolled back
    pub failure: Option<IngestFailure>,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
}

impl IngestReport {
    /// Create a report for a run that has not started
    pub fn new(table: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            table: table.into(),
            source: source.into(),
            started_at: Utc::now(),
            state: PipelineState::Idle,
            rows_read: 0,
            rows_normalized: 0,
            rows_staged: 0,
            rows_already_present: 0,
            rows_inserted: 0,
            failure: None,
            duration_ms: 0,
        }
    }

    /// Check if the run committed
    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Committed && self.failure.is_none()
    }

    fn advance(&mut self, to: PipelineState) -> IngestResult<()> {
        self.state = self.state.transition(to)?;
        info!(run_id = %self.run_id, table = %self.table, state = %self.state, "Ingest state changed");
        Ok(())
    }
}

/// Ingest a CSV file into `schema`'s table
///
/// # Arguments
/// * `conn` - Connection the whole run uses; no transaction may be open
/// * `file_path` - CSV file with a header row
/// * `schema` - Target table description
/// * `required_columns` - Rows with NULL in any of these are skipped
/// * `conflict_columns` - Uniqueness key of the target table
/// * `options` - Delimiter, batch size and staging naming
///
/// # Returns
/// A report; on failure its `state` is `RolledBack` and `failure` carries the
/// last state reached and the cause.
#[instrument(skip_all, fields(table = %schema.name, file = %file_path.display()))]
pub async fn run(
    conn: &dyn IngestConnection,
    file_path: &Path,
    schema: &TableSchema,
    required_columns: &[String],
    conflict_columns: &[String],
    options: &IngestOptions,
) -> IngestReport {
    let start = std::time::Instant::now();
    let mut report = IngestReport::new(schema.name.clone(), file_path);
    let mut progress = Progress {
        step: IngestStep::Validate,
        in_transaction: false,
    };

    let outcome = execute(
        conn,
        file_path,
        schema,
        required_columns,
        conflict_columns,
        options,
        &mut report,
        &mut progress,
    )
    .await;

    if let Err(e) = outcome {
        let failed_at = report.state;

        if progress.in_transaction && let Err(rollback_error) = conn.rollback().await {
            error!(run_id = %report.run_id, error = %rollback_error, "Rollback failed");
        }

        report.state = PipelineState::RolledBack;
        report.failure = Some(IngestFailure {
            state: failed_at,
            step: progress.step,
            reason: e.to_string(),
        });
        warn!(
            run_id = %report.run_id,
            state = %failed_at,
            step = %progress.step,
            error = %e,
            "Ingest rolled back"
        );
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        run_id = %report.run_id,
        state = %report.state,
        rows_read = report.rows_read,
        rows_inserted = report.rows_inserted,
        duration_ms = report.duration_ms,
        "Ingest finished"
    );
    report
}

struct Progress {
    step: IngestStep,
    in_transaction: bool,
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    conn: &dyn IngestConnection,
    file_path: &Path,
    schema: &TableSchema,
    required_columns: &[String],
    conflict_columns: &[String],
    options: &IngestOptions,
    report: &mut IngestReport,
    progress: &mut Progress,
) -> IngestResult<()> {
    report.advance(PipelineState::Normalizing)?;

    let dialect = dialect_for(conn.dialect_name())?;
    validate_columns(schema, required_columns, conflict_columns)?;
    let codec = ArrayCodec::for_dialect(dialect.name(), options.delimiter)?;

    progress.step = IngestStep::ReadFile;
    let raw_rows = read_raw_rows(file_path)?;
    report.rows_read = raw_rows.len();
    let rows = normalize(
        raw_rows,
        schema,
        required_columns,
        conflict_columns,
        options.delimiter,
    );
    report.rows_normalized = rows.len();

    progress.step = IngestStep::Begin;
    conn.begin().await?;
    progress.in_transaction = true;

    progress.step = IngestStep::PrepareStaging;
    let staging = staging::prepare(conn, dialect, &schema.name, options).await?;
    report.advance(PipelineState::StagingPrepared)?;

    progress.step = IngestStep::Load;
    report.rows_staged = loader::load(
        conn,
        dialect,
        &staging,
        schema,
        &rows,
        codec,
        options.batch_size,
    )
    .await?;
    report.advance(PipelineState::Loaded)?;

    progress.step = IngestStep::Dedupe;
    report.rows_already_present =
        dedupe::dedupe(conn, &staging, &schema.name, conflict_columns).await?;
    report.advance(PipelineState::Deduped)?;

    progress.step = IngestStep::Merge;
    report.rows_inserted = upsert::merge(
        conn,
        dialect,
        &schema.name,
        &staging,
        schema,
        conflict_columns,
    )
    .await?;
    report.advance(PipelineState::Merged)?;

    progress.step = IngestStep::Commit;
    conn.commit().await?;
    progress.in_transaction = false;
    report.advance(PipelineState::Committed)?;

    Ok(())
}

/// Number of rows already in `table`
///
/// Used to seed a table only when it is still empty.
pub async fn target_row_count(conn: &dyn IngestConnection, table: &str) -> IngestResult<u64> {
    validate_table_name(table)?;
    let result = conn
        .execute_query(&format!("SELECT COUNT(*) AS row_count FROM {}", table))
        .await?;
    result
        .scalar_i64()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            IngestError::Database(DatabaseError::QueryFailed(format!(
                "COUNT(*) on {} returned no number",
                table
            )))
        })
}

fn validate_columns(
    schema: &TableSchema,
    required_columns: &[String],
    conflict_columns: &[String],
) -> IngestResult<()> {
    schema.validate()?;

    for column in required_columns.iter().chain(conflict_columns) {
        if !schema.is_data_column(column) {
            return Err(IngestError::UnknownColumn {
                column: column.clone(),
                table: schema.name.clone(),
            });
        }
    }
    Ok(())
}
