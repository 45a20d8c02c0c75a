//! CSV reading and row normalization
//!
//! [`normalize`] never fails on data: malformed cells become NULL or empty
//! lists and rows that cannot satisfy the table are dropped. Only problems
//! with the file itself (missing, unreadable, no header row) are errors, and
//! those come from [`read_raw_rows`].

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use crate::models::{CellValue, ColumnKind, ColumnSpec, NormalizedRow, RawRow, TableSchema};

use super::{IngestError, IngestResult};

/// Cell contents treated as NULL
pub const NULL_MARKERS: &[&str] = &["None", "null", "NULL"];

const UTF8_BOM: char = '\u{feff}';

/// Read every record of a CSV file
///
/// The first row is the header. Short records leave the trailing columns
/// absent; records the reader cannot decode are skipped with a warning.
///
/// # Errors
///
/// Returns an error when the file does not exist, cannot be opened, or has no
/// header row.
pub fn read_raw_rows(path: &Path) -> IngestResult<Vec<RawRow>> {
    if !path.exists() {
        return Err(IngestError::FileNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches(UTF8_BOM).to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::MissingHeader(path.to_path_buf()));
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                return Err(IngestError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                // Header is line 1
                warn!(line = index + 2, error = %e, "Skipping unreadable CSV record");
                continue;
            }
        };

        rows.push(RawRow::from_pairs(
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.as_str(), record.get(i))),
        ));
    }

    debug!(path = %path.display(), rows = rows.len(), "Read CSV file");
    Ok(rows)
}

/// Clean, filter, deduplicate and coerce raw rows against a table
///
/// Steps, in order:
/// 1. null markers and empty cells become NULL
/// 2. header names are trimmed
/// 3. rows with NULL in any required column are dropped
/// 4. cells are projected onto the table's data columns
/// 5. cells are trimmed
/// 6. rows repeating an earlier conflict key are dropped
/// 7. cells are coerced to their column kind
/// 8. non-finite and out-of-range decimals become NULL
///
/// A required cell can still turn out unusable after step 5 (whitespace
/// only) or step 7 (an unparsable required decimal). Such rows are dropped
/// before step 6 so they never claim a conflict key from a later valid row.
pub fn normalize(
    raw_rows: Vec<RawRow>,
    schema: &TableSchema,
    required_columns: &[String],
    conflict_columns: &[String],
    delimiter: char,
) -> Vec<NormalizedRow> {
    let input_count = raw_rows.len();
    let columns: Vec<&ColumnSpec> = schema.data_columns().collect();

    let present: Vec<RawRow> = raw_rows
        .into_iter()
        .map(|row| {
            row.map_cells(|header, value| {
                (
                    header.trim().to_string(),
                    value.filter(|v| !is_null_marker(v)),
                )
            })
        })
        .filter(|row| required_columns.iter().all(|c| row.get(c).is_some()))
        .collect();

    if present.len() < input_count {
        debug!(
            dropped = input_count - present.len(),
            "Dropped rows missing required fields"
        );
    }

    let key_indices: Vec<usize> = if conflict_columns.is_empty() {
        (0..columns.len()).collect()
    } else {
        indices_of(&columns, conflict_columns)
    };
    let required_indices = indices_of(&columns, required_columns);

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    let mut repeated = 0usize;
    let mut rows = Vec::with_capacity(present.len());

    for row in &present {
        let cells: Vec<Option<String>> = columns
            .iter()
            .map(|column| row.get(&column.name).map(|v| v.trim().to_string()))
            .collect();

        let mut normalized = NormalizedRow::new();
        for (column, cell) in columns.iter().zip(&cells) {
            normalized.insert(column.name.clone(), coerce(column, cell.as_deref(), delimiter));
        }

        if let Some(&blank) = required_indices
            .iter()
            .find(|&&i| is_unusable(columns[i], cells[i].as_deref(), &normalized))
        {
            warn!(column = %columns[blank].name, "Dropping row with blank required field");
            continue;
        }

        if !seen.insert(key_indices.iter().map(|&i| cells[i].clone()).collect()) {
            repeated += 1;
            continue;
        }
        rows.push(normalized);
    }

    if repeated > 0 {
        debug!(dropped = repeated, "Dropped rows repeating a conflict key");
    }

    debug!(
        input = input_count,
        output = rows.len(),
        table = %schema.name,
        "Normalized rows"
    );
    rows
}

/// Read a CSV file and normalize its rows
pub fn load_and_normalize(
    path: &Path,
    schema: &TableSchema,
    required_columns: &[String],
    conflict_columns: &[String],
    delimiter: char,
) -> IngestResult<Vec<NormalizedRow>> {
    let raw_rows = read_raw_rows(path)?;
    Ok(normalize(
        raw_rows,
        schema,
        required_columns,
        conflict_columns,
        delimiter,
    ))
}

fn is_null_marker(value: &str) -> bool {
    value.is_empty() || NULL_MARKERS.contains(&value)
}

fn indices_of(columns: &[&ColumnSpec], names: &[String]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, c)| names.contains(&c.name))
        .map(|(i, _)| i)
        .collect()
}

/// A required cell that is blank after trimming, or a required scalar that
/// coerced to NULL
fn is_unusable(column: &ColumnSpec, trimmed: Option<&str>, row: &NormalizedRow) -> bool {
    trimmed.is_none_or(str::is_empty)
        || (!column.kind.is_array() && row.get(&column.name).is_none_or(CellValue::is_null))
}

fn coerce(column: &ColumnSpec, cell: Option<&str>, default_delimiter: char) -> CellValue {
    match column.kind {
        ColumnKind::TextArray => {
            let delimiter = column.delimiter.unwrap_or(default_delimiter);
            CellValue::List(split_list(cell, delimiter))
        }
        ColumnKind::Decimal { precision, scale } => match cell.map(str::parse::<f64>) {
            Some(Ok(value)) if value.is_finite() => {
                let value = if column.is_currency {
                    round_currency(value)
                } else {
                    value
                };
                if fits_decimal(value, precision, scale) {
                    CellValue::Decimal(value)
                } else {
                    debug!(column = %column.name, value, precision, scale, "Decimal out of range");
                    CellValue::Null
                }
            }
            Some(Ok(_)) => CellValue::Null,
            Some(Err(_)) => {
                debug!(column = %column.name, value = ?cell, "Unparsable decimal");
                CellValue::Null
            }
            None => CellValue::Null,
        },
        ColumnKind::Text | ColumnKind::Identifier => CellValue::text_or_null(cell),
    }
}

fn split_list(cell: Option<&str>, delimiter: char) -> Vec<String> {
    match cell {
        Some(s) => s
            .split(delimiter)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Whether `value` survives a cast to `DECIMAL(precision, scale)`
///
/// The integer part may hold at most `precision - scale` digits once the
/// value is rounded to `scale` places.
fn fits_decimal(value: f64, precision: u8, scale: u8) -> bool {
    let factor = 10f64.powi(i32::from(scale));
    let rounded = (value * factor).round() / factor;
    let limit = 10f64.powi(i32::from(precision) - i32::from(scale));
    rounded.abs() < limit
}

/// Round to cents, halves away from zero
fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tea_profile::{
        required_tea_profile_fields, tea_profile_conflict_columns, tea_profiles_schema,
    };
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn schema() -> TableSchema {
        TableSchema::new(
            "teas",
            vec![
                ColumnSpec::identifier("id"),
                ColumnSpec::text("name").not_null(),
                ColumnSpec::text("tea_type"),
                ColumnSpec::array("notes"),
                ColumnSpec::array("regions").with_delimiter(','),
                ColumnSpec::decimal("price", 7, 2).currency(),
            ],
        )
    }

    fn required() -> Vec<String> {
        vec!["name".to_string()]
    }

    fn conflict() -> Vec<String> {
        vec!["name".to_string()]
    }

    fn row(pairs: &[(&str, Option<&str>)]) -> RawRow {
        RawRow::from_pairs(pairs.iter().copied())
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn list(items: &[&str]) -> CellValue {
        CellValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_null_markers_become_null() {
        let rows = normalize(
            vec![row(&[
                ("name", Some("Dragonwell")),
                ("tea_type", Some("None")),
                ("notes", Some("null")),
                ("price", Some("NULL")),
            ])],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("tea_type"), Some(&CellValue::Null));
        assert_eq!(rows[0].get("notes"), Some(&list(&[])));
        assert_eq!(rows[0].get("price"), Some(&CellValue::Null));
    }

    #[test]
    fn test_required_field_exclusion() {
        let rows = normalize(
            vec![
                row(&[("name", Some("Sencha")), ("tea_type", Some("green"))]),
                row(&[("name", Some("")), ("tea_type", Some("green"))]),
                row(&[("name", Some("null")), ("tea_type", Some("black"))]),
                row(&[("tea_type", Some("oolong"))]),
            ],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&text("Sencha")));
    }

    #[test]
    fn test_whitespace_only_required_field_is_dropped() {
        let rows = normalize(
            vec![row(&[("name", Some("   ")), ("tea_type", Some("green"))])],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_blank_required_row_does_not_claim_conflict_key() {
        let required = vec!["name".to_string(), "tea_type".to_string()];
        let rows = normalize(
            vec![
                row(&[("name", Some("Dragonwell")), ("tea_type", Some("   "))]),
                row(&[("name", Some("Dragonwell")), ("tea_type", Some("green"))]),
            ],
            &schema(),
            &required,
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("tea_type"), Some(&text("green")));
    }

    #[test]
    fn test_unparsable_required_decimal_does_not_claim_conflict_key() {
        let required = vec!["name".to_string(), "price".to_string()];
        let rows = normalize(
            vec![
                row(&[("name", Some("Keemun")), ("price", Some("cheap"))]),
                row(&[("name", Some("Keemun")), ("price", Some("2.25"))]),
            ],
            &schema(),
            &required,
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("price"), Some(&CellValue::Decimal(2.25)));
    }

    #[test]
    fn test_blank_required_array_is_dropped() {
        let required = vec!["name".to_string(), "notes".to_string()];
        let rows = normalize(
            vec![
                row(&[("name", Some("Sencha")), ("notes", Some("  "))]),
                row(&[("name", Some("Bancha")), ("notes", Some(";"))]),
            ],
            &schema(),
            &required,
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&text("Bancha")));
        assert_eq!(rows[0].get("notes"), Some(&list(&[])));
    }

    #[test]
    fn test_headers_trimming_to_same_name_keep_first() {
        for _ in 0..20 {
            let rows = normalize(
                vec![row(&[
                    ("name", Some("Assam")),
                    (" tea_type", Some("black")),
                    ("tea_type ", Some("green")),
                ])],
                &schema(),
                &required(),
                &conflict(),
                ';',
            );
            assert_eq!(rows[0].get("tea_type"), Some(&text("black")));
        }
    }

    #[test]
    fn test_headers_and_cells_are_trimmed() {
        let rows = normalize(
            vec![row(&[
                (" name ", Some("  Gyokuro  ")),
                ("tea_type\t", Some(" green")),
                (" notes", Some(" umami ;  ; sweet ")),
            ])],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&text("Gyokuro")));
        assert_eq!(rows[0].get("tea_type"), Some(&text("green")));
        assert_eq!(rows[0].get("notes"), Some(&list(&["umami", "sweet"])));
    }

    #[test]
    fn test_unknown_and_identifier_columns_are_dropped() {
        let rows = normalize(
            vec![row(&[
                ("id", Some("99")),
                ("name", Some("Assam")),
                ("caffeine", Some("high")),
            ])],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("id").is_none());
        assert!(rows[0].get("caffeine").is_none());
        assert_eq!(rows[0].len(), 5);
    }

    #[test]
    fn test_in_batch_dedup_keeps_first() {
        let rows = normalize(
            vec![
                row(&[("name", Some("Dragonwell")), ("tea_type", Some("green"))]),
                row(&[("name", Some(" Dragonwell ")), ("tea_type", Some("white"))]),
                row(&[("name", Some("Keemun")), ("tea_type", Some("black"))]),
            ],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("tea_type"), Some(&text("green")));
        assert_eq!(rows[1].get("name"), Some(&text("Keemun")));
    }

    #[test]
    fn test_array_delimiters() {
        let rows = normalize(
            vec![row(&[
                ("name", Some("Da Hong Pao")),
                ("notes", Some("roasted|mineral")),
                ("regions", Some("Wuyi, Fujian")),
            ])],
            &schema(),
            &required(),
            &conflict(),
            '|',
        );

        assert_eq!(rows[0].get("notes"), Some(&list(&["roasted", "mineral"])));
        assert_eq!(rows[0].get("regions"), Some(&list(&["Wuyi", "Fujian"])));
    }

    #[test]
    fn test_decimal_coercion() {
        let rows = normalize(
            vec![
                row(&[("name", Some("a")), ("price", Some("3.14159"))]),
                row(&[("name", Some("b")), ("price", Some("cheap"))]),
                row(&[("name", Some("c")), ("price", Some("inf"))]),
                row(&[("name", Some("d")), ("price", Some("NaN"))]),
                row(&[("name", Some("e")), ("price", Some("2.675"))]),
            ],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        let prices: Vec<&CellValue> = rows.iter().map(|r| r.get("price").unwrap()).collect();
        assert_eq!(prices[0], &CellValue::Decimal(3.14));
        assert_eq!(prices[1], &CellValue::Null);
        assert_eq!(prices[2], &CellValue::Null);
        assert_eq!(prices[3], &CellValue::Null);
        assert!(matches!(prices[4], CellValue::Decimal(v) if (v - 2.67).abs() < 0.011));
    }

    #[test]
    fn test_decimal_out_of_range_becomes_null() {
        let rows = normalize(
            vec![
                row(&[("name", Some("a")), ("price", Some("123456789"))]),
                row(&[("name", Some("b")), ("price", Some("99999.99"))]),
                row(&[("name", Some("c")), ("price", Some("99999.996"))]),
                row(&[("name", Some("d")), ("price", Some("-100000"))]),
            ],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );

        let prices: Vec<&CellValue> = rows.iter().map(|r| r.get("price").unwrap()).collect();
        assert_eq!(prices[0], &CellValue::Null);
        assert_eq!(prices[1], &CellValue::Decimal(99999.99));
        assert_eq!(prices[2], &CellValue::Null);
        assert_eq!(prices[3], &CellValue::Null);
    }

    #[test]
    fn test_fits_decimal() {
        assert!(fits_decimal(12.345, 4, 2));
        assert!(!fits_decimal(99.999, 4, 2));
        assert!(fits_decimal(-99.99, 4, 2));
        assert!(!fits_decimal(1.0, 2, 2));
        assert!(fits_decimal(0.5, 2, 2));
    }

    #[test]
    fn test_missing_array_is_empty_list() {
        let rows = normalize(
            vec![row(&[("name", Some("Pu-erh"))])],
            &schema(),
            &required(),
            &conflict(),
            ';',
        );
        assert_eq!(rows[0].get("notes"), Some(&list(&[])));
        assert_eq!(rows[0].get("regions"), Some(&list(&[])));
        assert_eq!(rows[0].get("tea_type"), Some(&CellValue::Null));
    }

    #[test]
    fn test_read_raw_rows_short_record_and_bom() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\u{feff}name,tea_type,notes\nSencha,green,grassy\nBancha,green\n").unwrap();

        let rows = read_raw_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Sencha"));
        assert_eq!(rows[1].get("tea_type"), Some("green"));
        assert_eq!(rows[1].get("notes"), None);
        assert!(rows[1].contains("notes"));
    }

    #[test]
    fn test_read_raw_rows_missing_file() {
        let result = read_raw_rows(Path::new("/nonexistent/teas.csv"));
        assert!(matches!(result, Err(IngestError::FileNotFound(_))));
    }

    #[test]
    fn test_read_raw_rows_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let result = read_raw_rows(file.path());
        assert!(matches!(result, Err(IngestError::MissingHeader(_))));
    }

    #[test]
    fn test_load_and_normalize_tea_profiles() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name,tea_type,cultivars,country_of_origin,liquor_appearance,liquor_aroma,liquor_taste,avg_price_per_oz_usd"
        )
        .unwrap();
        writeln!(
            file,
            "Dragonwell,green,Longjing #43,China,pale green,chestnut;toasty,sweet;nutty,4.999"
        )
        .unwrap();
        writeln!(file, "Mystery,,,,,,,").unwrap();

        let rows = load_and_normalize(
            file.path(),
            &tea_profiles_schema(),
            &required_tea_profile_fields(),
            &tea_profile_conflict_columns(),
            ';',
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("liquor_taste"), Some(&list(&["sweet", "nutty"])));
        assert_eq!(rows[0].get("avg_price_per_oz_usd"), Some(&CellValue::Decimal(5.0)));
        assert_eq!(rows[0].get("alternative_names"), Some(&list(&[])));
    }
}
