//! Validation functionality
//!
//! Provides identifier validation for every name spliced into generated SQL.

pub mod input;

pub use input::{ValidationError, ValidationResult, validate_column_name, validate_table_name};
