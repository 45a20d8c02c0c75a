//! Staging table lifecycle

use tracing::debug;

use crate::database::IngestConnection;
use crate::validation::validate_table_name;

use super::dialect::{StagingDialect, StagingTable};
use super::{IngestOptions, IngestResult};

/// Create the staging table for `target_table` if needed and empty it
///
/// Safe to call repeatedly; each call leaves the staging table empty. When the
/// dialect needs DDL committed before use, the surrounding transaction is
/// committed and a new one opened.
pub async fn prepare(
    conn: &dyn IngestConnection,
    dialect: &dyn StagingDialect,
    target_table: &str,
    options: &IngestOptions,
) -> IngestResult<StagingTable> {
    let staging = dialect.staging_identifier(target_table, options);
    validate_table_name(&staging.name)?;
    if let Some(schema) = &staging.schema {
        validate_table_name(schema)?;
    }

    conn.execute_batch(&dialect.prepare_staging_sql(&staging, target_table))
        .await?;

    if dialect.ddl_requires_commit() {
        conn.commit().await?;
        conn.begin().await?;
    }

    debug!(staging = %staging, target = target_table, "Prepared staging table");
    Ok(staging)
}
