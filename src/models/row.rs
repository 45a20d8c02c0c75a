//! Raw and normalized ingest rows

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::schema::ColumnSpec;
use super::value::CellValue;

/// One record as read from the input file
///
/// Cells keep the file's column order. Header names are kept exactly as they
/// appear in the file; trimming and null-marker handling happen in the
/// normalizer. When a header repeats, the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, Option<String>)>,
}

impl RawRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from header/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (header, value) in pairs {
            row.push_first(header.into(), value.map(Into::into));
        }
        row
    }

    /// Get a cell value; `None` when the column is absent or null
    pub fn get(&self, column: &str) -> Option<&str> {
        self.position(column)
            .and_then(|i| self.cells[i].1.as_deref())
    }

    /// Check if the row has a column, null or not
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Set a cell value, replacing an existing cell of the same header
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.position(&column) {
            Some(i) => self.cells[i].1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Header names in file order
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(header, _)| header.as_str())
    }

    /// Rebuild the row by mapping every header/value pair in order
    ///
    /// Pairs that map onto an already-seen header are discarded.
    pub fn map_cells(
        self,
        mut f: impl FnMut(String, Option<String>) -> (String, Option<String>),
    ) -> Self {
        let mut row = Self::new();
        for (header, value) in self.cells {
            let (header, value) = f(header, value);
            row.push_first(header, value);
        }
        row
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.cells.iter().position(|(header, _)| header == column)
    }

    fn push_first(&mut self, header: String, value: Option<String>) {
        if !self.contains(&header) {
            self.cells.push((header, value));
        }
    }
}

/// One record after normalization, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    values: HashMap<String, CellValue>,
}

impl NormalizedRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    /// Set a value
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.values.insert(column.into(), value);
    }

    /// Number of columns in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in the order of `columns`; absent arrays become empty lists and
    /// absent scalars become NULL
    pub fn values_for<'a>(
        &'a self,
        columns: impl IntoIterator<Item = &'a ColumnSpec>,
    ) -> Vec<CellValue> {
        columns
            .into_iter()
            .map(|column| match self.values.get(&column.name) {
                Some(value) => value.clone(),
                None if column.kind.is_array() => CellValue::List(Vec::new()),
                None => CellValue::Null,
            })
            .collect()
    }
}
