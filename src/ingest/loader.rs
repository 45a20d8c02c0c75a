//! Bulk loading into the staging table

use tracing::debug;

use crate::database::IngestConnection;
use crate::models::{CellValue, ColumnSpec, NormalizedRow, TableSchema};

use super::IngestResult;
use super::codec::ArrayCodec;
use super::dialect::{StagingDialect, StagingTable};

/// Most bind parameters one statement may carry (PostgreSQL wire limit)
pub const MAX_BIND_PARAMETERS: usize = 65535;

/// Rows per INSERT: `batch_size`, capped so the statement stays within
/// [`MAX_BIND_PARAMETERS`]
pub fn rows_per_statement(batch_size: usize, column_count: usize) -> usize {
    let cap = MAX_BIND_PARAMETERS / column_count.max(1);
    batch_size.clamp(1, cap.max(1))
}

/// Build a multi-row INSERT for `row_count` rows
///
/// Placeholders are numbered row-major and each carries the column's cast.
pub fn build_insert_sql(
    dialect: &dyn StagingDialect,
    staging: &StagingTable,
    columns: &[&ColumnSpec],
    row_count: usize,
) -> String {
    let column_list = columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let tuples = (0..row_count)
        .map(|row| {
            let placeholders = columns
                .iter()
                .enumerate()
                .map(|(i, column)| dialect.cast_placeholder(row * columns.len() + i + 1, column))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", placeholders)
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("INSERT INTO {} ({}) VALUES {}", staging, column_list, tuples)
}

/// Write normalized rows into the staging table
///
/// Columns are written in table order, excluding the identifier. Lists are
/// encoded with `codec` before binding. Batches larger than the bind
/// parameter limit allows are split further. Returns the number of rows written.
pub async fn load(
    conn: &dyn IngestConnection,
    dialect: &dyn StagingDialect,
    staging: &StagingTable,
    schema: &TableSchema,
    rows: &[NormalizedRow],
    codec: ArrayCodec,
    batch_size: usize,
) -> IngestResult<u64> {
    let columns: Vec<&ColumnSpec> = schema.data_columns().collect();
    let chunk_size = rows_per_statement(batch_size, columns.len());
    if chunk_size < batch_size {
        debug!(batch_size, chunk_size, "Batch size capped by bind parameter limit");
    }
    let mut written = 0u64;

    for (batch_index, batch) in rows.chunks(chunk_size).enumerate() {
        let sql = build_insert_sql(dialect, staging, &columns, batch.len());
        let params: Vec<CellValue> = batch
            .iter()
            .flat_map(|row| row.values_for(columns.iter().copied()))
            .map(|value| codec.encode_value(value))
            .collect();

        written += conn.execute(&sql, &params).await?;
        debug!(
            staging = %staging,
            batch = batch_index,
            rows = batch.len(),
            "Loaded staging batch"
        );
    }

    Ok(written)
}
