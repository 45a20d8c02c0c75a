//! Table descriptions consumed by the ingest pipeline
//!
//! A [`TableSchema`] is plain data: it is built once (for example by
//! [`crate::models::tea_profile::tea_profiles_schema`]) and passed by reference
//! into every pipeline step. Nothing in the pipeline reaches back into a live
//! database catalogue to discover column types.

use serde::{Deserialize, Serialize};

use crate::validation::input::{
    ValidationError, ValidationResult, validate_column_name, validate_table_name,
};

/// Default delimiter for array columns
pub const DEFAULT_DELIMITER: char = ';';

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    /// Auto-assigned surrogate key, never read from input
    Identifier,
    /// Free text
    Text,
    /// List of strings, delimiter-encoded where the backend has no arrays
    TextArray,
    /// Fixed-precision decimal
    Decimal { precision: u8, scale: u8 },
}

impl ColumnKind {
    /// Whether values of this kind are lists
    pub fn is_array(&self) -> bool {
        matches!(self, ColumnKind::TextArray)
    }
}

/// A single column of a [`TableSchema`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Semantic type
    #[serde(flatten)]
    pub kind: ColumnKind,
    /// Whether the target column allows NULL (default: true)
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Per-column input delimiter for array columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    /// Round decimal values to two places
    #[serde(default)]
    pub is_currency: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnSpec {
    fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            delimiter: None,
            is_currency: false,
        }
    }

    /// Create an identifier column
    pub fn identifier(name: impl Into<String>) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, ColumnKind::Identifier)
        }
    }

    /// Create a text column
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    /// Create an array-of-string column
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::TextArray)
    }

    /// Create a decimal column with the given precision and scale
    pub fn decimal(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(name, ColumnKind::Decimal { precision, scale })
    }

    /// Mark the column NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Override the input delimiter for an array column
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Mark a decimal column as a currency amount
    pub fn currency(mut self) -> Self {
        self.is_currency = true;
        self
    }

    /// Check if this is the identifier column
    pub fn is_identifier(&self) -> bool {
        self.kind == ColumnKind::Identifier
    }
}

/// Ordered description of a target table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Target table name
    pub name: String,
    /// Columns in table order
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Create a new table schema
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns that accept input, in table order
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| !c.is_identifier())
    }

    /// Names of the columns that accept input, in table order
    pub fn data_column_names(&self) -> Vec<&str> {
        self.data_columns().map(|c| c.name.as_str()).collect()
    }

    /// Check whether `name` is a column that accepts input
    pub fn is_data_column(&self, name: &str) -> bool {
        self.column(name).is_some_and(|c| !c.is_identifier())
    }

    /// Validate table and column names and reject duplicates
    pub fn validate(&self) -> ValidationResult<()> {
        validate_table_name(&self.name)?;

        if self.columns.iter().all(ColumnSpec::is_identifier) {
            return Err(ValidationError::InvalidFormat(
                "table schema",
                format!("table '{}' has no data columns", self.name),
            ));
        }

        for (i, column) in self.columns.iter().enumerate() {
            validate_column_name(&column.name)?;

            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(ValidationError::InvalidFormat(
                    "table schema",
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }

        Ok(())
    }
}
