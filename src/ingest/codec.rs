//! List-of-string encoding per backend
//!
//! Backends with native arrays store lists as they are. The others store a
//! single delimiter-joined string. Delimiters inside elements are not escaped,
//! so an element containing the delimiter splits on the way back.

use crate::models::{CellValue, DEFAULT_DELIMITER};

use super::IngestResult;
use super::dialect::dialect_for;

/// Array encoding chosen from a connection's dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayCodec {
    /// Lists pass through unchanged
    Native,
    /// Lists are joined into one string
    Delimited { delimiter: char },
}

impl Default for ArrayCodec {
    fn default() -> Self {
        ArrayCodec::Delimited {
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl ArrayCodec {
    /// Pick the codec for a dialect name
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UnsupportedDialect`](super::IngestError::UnsupportedDialect)
    /// for names no backend is registered under.
    pub fn for_dialect(dialect_name: &str, delimiter: char) -> IngestResult<Self> {
        let dialect = dialect_for(dialect_name)?;
        Ok(if dialect.supports_native_arrays() {
            ArrayCodec::Native
        } else {
            ArrayCodec::Delimited { delimiter }
        })
    }

    /// Encode a list into its stored form
    pub fn encode(&self, items: Vec<String>) -> CellValue {
        match self {
            ArrayCodec::Native => CellValue::List(items),
            ArrayCodec::Delimited { delimiter } => {
                CellValue::Text(items.join(delimiter.to_string().as_str()))
            }
        }
    }

    /// Decode a stored value back into a list
    ///
    /// NULL and the empty string both decode to an empty list.
    pub fn decode(&self, value: &CellValue) -> Vec<String> {
        match value {
            CellValue::List(items) => items.clone(),
            CellValue::Text(s) if s.is_empty() => Vec::new(),
            CellValue::Text(s) => match self {
                ArrayCodec::Delimited { delimiter } => {
                    s.split(*delimiter).map(str::to_string).collect()
                }
                ArrayCodec::Native => vec![s.clone()],
            },
            CellValue::Null | CellValue::Decimal(_) => Vec::new(),
        }
    }

    /// Encode a normalized value for binding
    ///
    /// Lists are encoded; every other value passes through.
    pub fn encode_value(&self, value: CellValue) -> CellValue {
        match value {
            CellValue::List(items) => self.encode(items),
            other => other,
        }
    }
}
