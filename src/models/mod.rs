//! Table descriptions, typed values and rows used by the ingest pipeline

pub mod row;
pub mod schema;
pub mod tea_profile;
pub mod value;

pub use row::{NormalizedRow, RawRow};
pub use schema::{ColumnKind, ColumnSpec, DEFAULT_DELIMITER, TableSchema};
pub use tea_profile::{TEA_PROFILES_TABLE, TeaProfileFields, tea_profiles_schema};
pub use value::CellValue;
