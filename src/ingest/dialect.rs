//! Backend dialects
//!
//! Everything that differs between the server backend (PostgreSQL) and the
//! embedded backend (DuckDB) is answered here: staging table naming and
//! lifecycle, placeholder casts, the insert-or-ignore form and target DDL.
//! The pipeline asks [`dialect_for`] once per run and never compares dialect
//! names itself.

use std::fmt;

use crate::models::{ColumnKind, ColumnSpec, TableSchema};

use super::{IngestError, IngestOptions, IngestResult};

/// Dialect name reported by PostgreSQL connections
pub const POSTGRESQL: &str = "postgresql";
/// Dialect name reported by DuckDB connections
pub const DUCKDB: &str = "duckdb";

/// Name of a staging table, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    pub schema: Option<String>,
    pub name: String,
}

impl StagingTable {
    /// Name to use in SQL statements
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for StagingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Dialect-specific SQL used by the ingest pipeline
///
/// Table and column names passed in are expected to be validated
/// identifiers; they are written into SQL unquoted.
pub trait StagingDialect {
    /// Dialect name, as reported by [`IngestConnection::dialect_name`](crate::database::IngestConnection::dialect_name)
    fn name(&self) -> &'static str;

    /// Whether list values are stored as native arrays
    fn supports_native_arrays(&self) -> bool;

    /// Whether staging DDL must be committed before rows are loaded
    fn ddl_requires_commit(&self) -> bool {
        false
    }

    /// Staging table for a target table
    fn staging_identifier(&self, target_table: &str, options: &IngestOptions) -> StagingTable;

    /// Statements that create the staging table if needed and leave it empty
    fn prepare_staging_sql(&self, staging: &StagingTable, target_table: &str) -> String;

    /// Storage type of a column
    fn column_type(&self, column: &ColumnSpec) -> String;

    /// Column definition of an auto-assigned primary key
    fn identifier_column_sql(&self, table: &str, column: &ColumnSpec) -> String;

    /// Placeholder for the 1-based parameter `index`, cast to the column's type
    fn cast_placeholder(&self, index: usize, column: &ColumnSpec) -> String;

    /// Copy staging rows into the target, skipping rows that conflict
    fn insert_or_ignore_sql(
        &self,
        target_table: &str,
        staging: &StagingTable,
        columns: &[&str],
        conflict_columns: &[String],
    ) -> String;

    /// DDL that creates the target table if it does not exist
    fn create_table_sql(&self, schema: &TableSchema, unique_columns: &[String]) -> String;
}

/// PostgreSQL: native `TEXT[]` arrays, an `UNLOGGED` staging table in its own schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerBackend;

/// DuckDB: arrays stored as delimiter-joined `VARCHAR`, staging next to the target
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBackend;

static SERVER_BACKEND: ServerBackend = ServerBackend;
static EMBEDDED_BACKEND: EmbeddedBackend = EmbeddedBackend;

/// Resolve the dialect for a connection's dialect name
///
/// # Errors
///
/// Returns [`IngestError::UnsupportedDialect`] for any other name.
pub fn dialect_for(name: &str) -> IngestResult<&'static dyn StagingDialect> {
    match name {
        POSTGRESQL => Ok(&SERVER_BACKEND),
        DUCKDB => Ok(&EMBEDDED_BACKEND),
        other => Err(IngestError::UnsupportedDialect(other.to_string())),
    }
}

fn unique_clause(unique_columns: &[String]) -> Option<String> {
    if unique_columns.is_empty() {
        None
    } else {
        Some(format!("UNIQUE ({})", unique_columns.join(", ")))
    }
}

fn column_definitions(
    dialect: &dyn StagingDialect,
    schema: &TableSchema,
    unique_columns: &[String],
) -> String {
    let mut definitions: Vec<String> = schema
        .columns
        .iter()
        .map(|column| {
            if column.is_identifier() {
                dialect.identifier_column_sql(&schema.name, column)
            } else if column.nullable {
                format!("{} {}", column.name, dialect.column_type(column))
            } else {
                format!("{} {} NOT NULL", column.name, dialect.column_type(column))
            }
        })
        .collect();
    definitions.extend(unique_clause(unique_columns));
    definitions.join(",\n    ")
}

impl StagingDialect for ServerBackend {
    fn name(&self) -> &'static str {
        POSTGRESQL
    }

    fn supports_native_arrays(&self) -> bool {
        true
    }

    fn staging_identifier(&self, target_table: &str, options: &IngestOptions) -> StagingTable {
        StagingTable {
            schema: Some(options.staging_schema.clone()),
            name: format!("{}{}", target_table, options.staging_suffix),
        }
    }

    fn prepare_staging_sql(&self, staging: &StagingTable, target_table: &str) -> String {
        let mut statements = Vec::with_capacity(3);
        if let Some(schema) = &staging.schema {
            statements.push(format!("CREATE SCHEMA IF NOT EXISTS {}", schema));
        }
        statements.push(format!(
            "CREATE UNLOGGED TABLE IF NOT EXISTS {} (LIKE {} INCLUDING ALL)",
            staging, target_table
        ));
        statements.push(format!("TRUNCATE TABLE {}", staging));
        statements.join(";\n") + ";"
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        match column.kind {
            ColumnKind::Identifier => "SERIAL".to_string(),
            ColumnKind::Text => "TEXT".to_string(),
            ColumnKind::TextArray => "TEXT[]".to_string(),
            ColumnKind::Decimal { precision, scale } => {
                format!("NUMERIC({}, {})", precision, scale)
            }
        }
    }

    fn identifier_column_sql(&self, _table: &str, column: &ColumnSpec) -> String {
        format!("{} SERIAL PRIMARY KEY", column.name)
    }

    fn cast_placeholder(&self, index: usize, column: &ColumnSpec) -> String {
        match column.kind {
            // Decimals are bound as text and converted server-side
            ColumnKind::Decimal { precision, scale } => format!(
                "CAST(CAST(${} AS TEXT) AS NUMERIC({}, {}))",
                index, precision, scale
            ),
            ColumnKind::TextArray => format!("CAST(${} AS TEXT[])", index),
            ColumnKind::Text | ColumnKind::Identifier => format!("CAST(${} AS TEXT)", index),
        }
    }

    fn insert_or_ignore_sql(
        &self,
        target_table: &str,
        staging: &StagingTable,
        columns: &[&str],
        conflict_columns: &[String],
    ) -> String {
        let column_list = columns.join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            target_table, column_list, column_list, staging
        );
        if conflict_columns.is_empty() {
            sql.push_str(" ON CONFLICT DO NOTHING");
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO NOTHING",
                conflict_columns.join(", ")
            ));
        }
        sql
    }

    fn create_table_sql(&self, schema: &TableSchema, unique_columns: &[String]) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            schema.name,
            column_definitions(self, schema, unique_columns)
        )
    }
}

impl StagingDialect for EmbeddedBackend {
    fn name(&self) -> &'static str {
        DUCKDB
    }

    fn supports_native_arrays(&self) -> bool {
        false
    }

    fn staging_identifier(&self, target_table: &str, options: &IngestOptions) -> StagingTable {
        StagingTable {
            schema: None,
            name: format!("{}{}", target_table, options.staging_suffix),
        }
    }

    fn prepare_staging_sql(&self, staging: &StagingTable, target_table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {staging} AS SELECT * FROM {target_table} WHERE false;\n\
             DELETE FROM {staging};"
        )
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        match column.kind {
            ColumnKind::Identifier => "INTEGER".to_string(),
            ColumnKind::Text | ColumnKind::TextArray => "VARCHAR".to_string(),
            ColumnKind::Decimal { precision, scale } => {
                format!("DECIMAL({}, {})", precision, scale)
            }
        }
    }

    fn identifier_column_sql(&self, table: &str, column: &ColumnSpec) -> String {
        format!(
            "{} INTEGER PRIMARY KEY DEFAULT nextval('{}_{}_seq')",
            column.name, table, column.name
        )
    }

    fn cast_placeholder(&self, _index: usize, column: &ColumnSpec) -> String {
        format!("CAST(? AS {})", self.column_type(column))
    }

    fn insert_or_ignore_sql(
        &self,
        target_table: &str,
        staging: &StagingTable,
        columns: &[&str],
        _conflict_columns: &[String],
    ) -> String {
        let column_list = columns.join(", ");
        format!(
            "INSERT OR IGNORE INTO {} ({}) SELECT {} FROM {}",
            target_table, column_list, column_list, staging
        )
    }

    fn create_table_sql(&self, schema: &TableSchema, unique_columns: &[String]) -> String {
        let mut sql = String::new();
        if let Some(identifier) = schema.columns.iter().find(|c| c.is_identifier()) {
            sql.push_str(&format!(
                "CREATE SEQUENCE IF NOT EXISTS {}_{}_seq;\n",
                schema.name, identifier.name
            ));
        }
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            schema.name,
            column_definitions(self, schema, unique_columns)
        ));
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tea_profile::{tea_profile_conflict_columns, tea_profiles_schema};

    fn options() -> IngestOptions {
        IngestOptions::default()
    }

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("postgresql").unwrap().name(), "postgresql");
        assert_eq!(dialect_for("duckdb").unwrap().name(), "duckdb");
        assert!(matches!(
            dialect_for("mysql"),
            Err(IngestError::UnsupportedDialect(name)) if name == "mysql"
        ));
    }

    #[test]
    fn test_native_arrays() {
        assert!(ServerBackend.supports_native_arrays());
        assert!(!EmbeddedBackend.supports_native_arrays());
        assert!(!ServerBackend.ddl_requires_commit());
        assert!(!EmbeddedBackend.ddl_requires_commit());
    }

    #[test]
    fn test_staging_identifier() {
        let server = ServerBackend.staging_identifier("tea_profiles", &options());
        assert_eq!(server.qualified_name(), "staging.tea_profiles_staging");

        let embedded = EmbeddedBackend.staging_identifier("tea_profiles", &options());
        assert_eq!(embedded.to_string(), "tea_profiles_staging");
        assert_eq!(embedded.schema, None);
    }

    #[test]
    fn test_server_prepare_sql() {
        let staging = ServerBackend.staging_identifier("tea_profiles", &options());
        let sql = ServerBackend.prepare_staging_sql(&staging, "tea_profiles");
        assert!(sql.contains("CREATE SCHEMA IF NOT EXISTS staging"));
        assert!(sql.contains(
            "CREATE UNLOGGED TABLE IF NOT EXISTS staging.tea_profiles_staging (LIKE tea_profiles INCLUDING ALL)"
        ));
        assert!(sql.contains("TRUNCATE TABLE staging.tea_profiles_staging"));
    }

    #[test]
    fn test_embedded_prepare_sql() {
        let staging = EmbeddedBackend.staging_identifier("tea_profiles", &options());
        let sql = EmbeddedBackend.prepare_staging_sql(&staging, "tea_profiles");
        assert!(sql.contains(
            "CREATE TABLE IF NOT EXISTS tea_profiles_staging AS SELECT * FROM tea_profiles WHERE false"
        ));
        assert!(sql.contains("DELETE FROM tea_profiles_staging"));
    }

    #[test]
    fn test_cast_placeholders() {
        let text = ColumnSpec::text("name");
        let array = ColumnSpec::array("cultivars");
        let price = ColumnSpec::decimal("price", 7, 2);

        assert_eq!(ServerBackend.cast_placeholder(1, &text), "CAST($1 AS TEXT)");
        assert_eq!(
            ServerBackend.cast_placeholder(2, &array),
            "CAST($2 AS TEXT[])"
        );
        assert_eq!(
            ServerBackend.cast_placeholder(3, &price),
            "CAST(CAST($3 AS TEXT) AS NUMERIC(7, 2))"
        );

        assert_eq!(EmbeddedBackend.cast_placeholder(1, &text), "CAST(? AS VARCHAR)");
        assert_eq!(
            EmbeddedBackend.cast_placeholder(2, &array),
            "CAST(? AS VARCHAR)"
        );
        assert_eq!(
            EmbeddedBackend.cast_placeholder(3, &price),
            "CAST(? AS DECIMAL(7, 2))"
        );
    }

    #[test]
    fn test_insert_or_ignore_sql() {
        let conflict = vec!["name".to_string()];
        let server_staging = ServerBackend.staging_identifier("teas", &options());
        assert_eq!(
            ServerBackend.insert_or_ignore_sql("teas", &server_staging, &["name", "tea_type"], &conflict),
            "INSERT INTO teas (name, tea_type) SELECT name, tea_type FROM staging.teas_staging ON CONFLICT (name) DO NOTHING"
        );

        let embedded_staging = EmbeddedBackend.staging_identifier("teas", &options());
        assert_eq!(
            EmbeddedBackend.insert_or_ignore_sql("teas", &embedded_staging, &["name", "tea_type"], &conflict),
            "INSERT OR IGNORE INTO teas (name, tea_type) SELECT name, tea_type FROM teas_staging"
        );
    }

    #[test]
    fn test_create_table_sql_server() {
        let sql = ServerBackend.create_table_sql(&tea_profiles_schema(), &tea_profile_conflict_columns());
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS tea_profiles ("));
        assert!(sql.contains("id SERIAL PRIMARY KEY,"));
        assert!(sql.contains("name TEXT NOT NULL"));
        assert!(sql.contains("cultivars TEXT[] NOT NULL"));
        assert!(sql.contains("subregions TEXT[],"));
        assert!(sql.contains("avg_price_per_oz_usd NUMERIC(7, 2)"));
        assert!(sql.contains("UNIQUE (name)"));
    }

    #[test]
    fn test_create_table_sql_embedded() {
        let sql = EmbeddedBackend.create_table_sql(&tea_profiles_schema(), &tea_profile_conflict_columns());
        assert!(sql.starts_with("CREATE SEQUENCE IF NOT EXISTS tea_profiles_id_seq;"));
        assert!(sql.contains("id INTEGER PRIMARY KEY DEFAULT nextval('tea_profiles_id_seq')"));
        assert!(sql.contains("cultivars VARCHAR NOT NULL"));
        assert!(sql.contains("avg_price_per_oz_usd DECIMAL(7, 2)"));
        assert!(sql.contains("UNIQUE (name)"));
    }
}
