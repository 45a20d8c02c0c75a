//! Identifier validation for generated SQL.
//!
//! Every table, schema and column name that the ingest pipeline splices into
//! a statement passes through these checks first. Names are emitted unquoted,
//! so the accepted alphabet is the one both PostgreSQL and DuckDB treat as a
//! plain identifier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for identifiers (PostgreSQL truncates at 63 bytes)
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Errors that can occur during input validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),

    /// Input is a reserved word
    #[error("{field} cannot be a reserved word: {word}")]
    ReservedWord { field: &'static str, word: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a table or schema name.
///
/// # Examples
///
/// ```
/// use tea_ingest::validation::input::validate_table_name;
///
/// assert!(validate_table_name("tea_profiles").is_ok());
/// assert!(validate_table_name("").is_err());
/// assert!(validate_table_name("tea-profiles").is_err());
/// ```
pub fn validate_table_name(name: &str) -> ValidationResult<()> {
    validate_identifier(name, "table name")
}

/// Validate a column name.
///
/// # Examples
///
/// ```
/// use tea_ingest::validation::input::validate_column_name;
///
/// assert!(validate_column_name("liquor_taste").is_ok());
/// assert!(validate_column_name("select").is_err());
/// ```
pub fn validate_column_name(name: &str) -> ValidationResult<()> {
    validate_identifier(name, "column name")
}

fn validate_identifier(name: &str, field: &'static str) -> ValidationResult<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(ValidationError::Empty(field));
    };

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_IDENTIFIER_LENGTH,
            actual: name.len(),
        });
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidFormat(
            field,
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(ValidationError::InvalidCharacters {
            field,
            reason: format!("invalid character: '{}'", c),
        });
    }

    if is_sql_reserved_word(name) {
        return Err(ValidationError::ReservedWord {
            field,
            word: name.to_string(),
        });
    }

    Ok(())
}

fn is_sql_reserved_word(word: &str) -> bool {
    const RESERVED_WORDS: &[&str] = &[
        "select",
        "from",
        "where",
        "insert",
        "update",
        "delete",
        "create",
        "drop",
        "alter",
        "table",
        "index",
        "view",
        "schema",
        "grant",
        "revoke",
        "commit",
        "rollback",
        "begin",
        "end",
        "transaction",
        "primary",
        "foreign",
        "key",
        "references",
        "constraint",
        "unique",
        "check",
        "default",
        "not",
        "null",
        "and",
        "or",
        "in",
        "is",
        "case",
        "when",
        "then",
        "else",
        "as",
        "on",
        "join",
        "group",
        "by",
        "having",
        "order",
        "limit",
        "offset",
        "union",
        "all",
        "distinct",
        "values",
        "set",
        "into",
        "true",
        "false",
    ];

    RESERVED_WORDS.contains(&word.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_table_name("tea_profiles").is_ok());
        assert!(validate_table_name("_scratch").is_ok());
        assert!(validate_column_name("avg_price_per_oz_usd").is_ok());
    }

    #[test]
    fn test_rejects_quoting_hazards() {
        assert!(matches!(
            validate_table_name("tea profiles"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_column_name("name;drop"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_column_name("1st"),
            Err(ValidationError::InvalidFormat(..))
        ));
    }

    #[test]
    fn test_rejects_reserved_and_empty() {
        assert_eq!(
            validate_table_name(""),
            Err(ValidationError::Empty("table name"))
        );
        assert!(matches!(
            validate_column_name("ORDER"),
            Err(ValidationError::ReservedWord { .. })
        ));
    }

    #[test]
    fn test_rejects_overlong_names() {
        let name = "t".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            validate_table_name(&name),
            Err(ValidationError::TooLong { .. })
        ));
    }
}
