//! Removal of staging rows that already exist in the target

use tracing::debug;

use crate::database::IngestConnection;

use super::IngestResult;
use super::dialect::StagingTable;

const EXISTING: &str = "existing";

/// Build the DELETE that drops staging rows matching a target row on every
/// conflict column
pub fn build_dedupe_sql(
    staging: &StagingTable,
    target_table: &str,
    conflict_columns: &[String],
) -> String {
    let matches = conflict_columns
        .iter()
        .map(|c| format!("{EXISTING}.{c} = {}.{c}", staging.name))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "DELETE FROM {staging} WHERE EXISTS (SELECT 1 FROM {target_table} AS {EXISTING} WHERE {matches})"
    )
}

/// Delete staging rows whose conflict key is already present in the target
///
/// Returns the number of rows deleted. With no conflict columns nothing is
/// deleted.
pub async fn dedupe(
    conn: &dyn IngestConnection,
    staging: &StagingTable,
    target_table: &str,
    conflict_columns: &[String],
) -> IngestResult<u64> {
    if conflict_columns.is_empty() {
        return Ok(0);
    }

    let deleted = conn
        .execute(&build_dedupe_sql(staging, target_table, conflict_columns), &[])
        .await?;
    debug!(staging = %staging, target = target_table, deleted, "Removed rows already in target");
    Ok(deleted)
}
