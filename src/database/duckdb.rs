//! DuckDB connection implementation
//!
//! Embedded backend used for local runs and tests. DuckDB has no array
//! binding through this driver, so list values reach it already encoded as
//! delimiter-joined text.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{DatabaseError, DatabaseResult, IngestConnection, QueryResult};
use crate::ingest::dialect::DUCKDB;
use crate::models::CellValue;

/// DuckDB connection
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBConnection {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBConnection {
    /// Open a file-based database, creating it if needed
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory database
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    fn transaction_statement(&self, sql: &str) -> DatabaseResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::TransactionFailed(format!("{} failed: {}", sql, e)))
    }

    fn bind(value: &CellValue) -> DatabaseResult<duckdb::types::Value> {
        use duckdb::types::Value;

        match value {
            CellValue::Null => Ok(Value::Null),
            CellValue::Text(s) => Ok(Value::Text(s.clone())),
            CellValue::Decimal(d) => Ok(Value::Double(*d)),
            CellValue::List(_) => Err(DatabaseError::InvalidInput(
                "DuckDB parameters cannot be lists; encode them first".to_string(),
            )),
        }
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        let float = |f: f64| {
            serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)
        };

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => i.into(),
            ValueRef::SmallInt(i) => i.into(),
            ValueRef::Int(i) => i.into(),
            ValueRef::BigInt(i) => i.into(),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => i.into(),
            ValueRef::USmallInt(i) => i.into(),
            ValueRef::UInt(i) => i.into(),
            ValueRef::UBigInt(i) => i.into(),
            ValueRef::Float(f) => float(f as f64),
            ValueRef::Double(f) => float(f),
            ValueRef::Decimal(d) => match d.to_string().parse::<f64>() {
                Ok(f) => float(f),
                Err(_) => serde_json::Value::String(d.to_string()),
            },
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            other => serde_json::Value::String(format!("{:?}", other)),
        }
    }
}

#[async_trait(?Send)]
impl IngestConnection for DuckDBConnection {
    fn dialect_name(&self) -> &'static str {
        DUCKDB
    }

    async fn begin(&self) -> DatabaseResult<()> {
        self.transaction_statement("BEGIN TRANSACTION")
    }

    async fn commit(&self) -> DatabaseResult<()> {
        self.transaction_statement("COMMIT")
    }

    async fn rollback(&self) -> DatabaseResult<()> {
        self.transaction_statement("ROLLBACK")
    }

    async fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Batch execute failed: {}", e)))
    }

    async fn execute(&self, sql: &str, params: &[CellValue]) -> DatabaseResult<u64> {
        let values = params
            .iter()
            .map(Self::bind)
            .collect::<DatabaseResult<Vec<_>>>()?;

        let changed = self
            .lock()?
            .execute(sql, duckdb::params_from_iter(values))
            .map_err(|e| DatabaseError::QueryFailed(format!("Execute failed: {}", e)))?;
        Ok(changed as u64)
    }

    async fn execute_query(&self, sql: &str) -> DatabaseResult<QueryResult> {
        let start = std::time::Instant::now();

        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;

        // In DuckDB 1.4+, we need to execute the query first, then get columns
        let mut result_rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(format!("Query failed: {}", e)))?;

        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{}", i))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            rows.push(Self::row_to_json(row, &columns));
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
