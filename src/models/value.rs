//! Typed cell values

use serde::{Deserialize, Serialize};

/// A typed value bound into or read out of a table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    /// SQL NULL
    #[default]
    Null,
    /// Non-empty, trimmed text
    Text(String),
    /// Finite decimal value
    Decimal(f64),
    /// List of non-empty strings
    List(Vec<String>),
}

impl CellValue {
    /// Build a text value, promoting blank text to NULL
    pub fn text_or_null(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(s) if !s.is_empty() => CellValue::Text(s.to_string()),
            _ => CellValue::Null,
        }
    }

    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Get the text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the decimal content, if any
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            CellValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the list content, if any
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            CellValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Decimal(value)
    }
}

impl From<Vec<String>> for CellValue {
    fn from(value: Vec<String>) -> Self {
        CellValue::List(value)
    }
}
