//! Insert-or-ignore merge from staging into the target

use tracing::debug;

use crate::database::IngestConnection;
use crate::models::TableSchema;

use super::IngestResult;
use super::dialect::{StagingDialect, StagingTable};

/// Copy staging rows into the target table, skipping conflicting keys
///
/// Existing target rows are never updated. Returns the number of rows
/// inserted.
pub async fn merge(
    conn: &dyn IngestConnection,
    dialect: &dyn StagingDialect,
    target_table: &str,
    staging: &StagingTable,
    schema: &TableSchema,
    conflict_columns: &[String],
) -> IngestResult<u64> {
    let columns = schema.data_column_names();
    let sql = dialect.insert_or_ignore_sql(target_table, staging, &columns, conflict_columns);

    let inserted = conn.execute(&sql, &[]).await?;
    debug!(target = target_table, inserted, "Merged staging rows");
    Ok(inserted)
}
