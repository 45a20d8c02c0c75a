//! The `tea_profiles` table
//!
//! Column catalogue for the one table the ingest job loads today. Callers
//! that load other tables build their own [`TableSchema`].

use super::schema::{ColumnSpec, TableSchema};

/// Target table name
pub const TEA_PROFILES_TABLE: &str = "tea_profiles";

/// Column names of the `tea_profiles` table
pub struct TeaProfileFields;

impl TeaProfileFields {
    pub const ID: &'static str = "id";

    pub const NAME: &'static str = "name";
    pub const ALTERNATIVE_NAMES: &'static str = "alternative_names";
    pub const TEA_TYPE: &'static str = "tea_type";
    pub const CULTIVARS: &'static str = "cultivars";
    pub const PROCESSING: &'static str = "processing";
    pub const OXIDATION_LEVEL: &'static str = "oxidation_level";
    pub const CULTURAL_SIGNIFICANCE: &'static str = "cultural_significance";
    pub const CULTURAL_SIGNIFICANCE_SOURCE: &'static str = "cultural_significance_source";

    pub const COUNTRY_OF_ORIGIN: &'static str = "country_of_origin";
    pub const SUBREGIONS: &'static str = "subregions";
    pub const AVG_PRICE_PER_OZ_USD: &'static str = "avg_price_per_oz_usd";

    pub const LIQUOR_APPEARANCE: &'static str = "liquor_appearance";
    pub const LIQUOR_AROMA: &'static str = "liquor_aroma";
    pub const LIQUOR_TASTE: &'static str = "liquor_taste";
    pub const LIQUOR_BODY_MOUTHFEEL: &'static str = "liquor_body_mouthfeel";
    pub const BODY_EFFECT: &'static str = "body_effect";

    pub const DRY_LEAF_APPEARANCE: &'static str = "dry_leaf_appearance";
    pub const DRY_LEAF_AROMA: &'static str = "dry_leaf_aroma";

    pub const WET_LEAF_APPEARANCE: &'static str = "wet_leaf_appearance";
    pub const WET_LEAF_AROMA: &'static str = "wet_leaf_aroma";
}

/// Columns a tea profile row must carry to be ingested
pub const REQUIRED_TEA_PROFILE_FIELDS: &[&str] = &[
    TeaProfileFields::NAME,
    TeaProfileFields::TEA_TYPE,
    TeaProfileFields::CULTIVARS,
    TeaProfileFields::COUNTRY_OF_ORIGIN,
    TeaProfileFields::LIQUOR_APPEARANCE,
    TeaProfileFields::LIQUOR_AROMA,
    TeaProfileFields::LIQUOR_TASTE,
];

/// Tea profiles are unique by name
pub const TEA_PROFILE_CONFLICT_COLUMNS: &[&str] = &[TeaProfileFields::NAME];

/// Build the `tea_profiles` schema
///
/// Required fields are NOT NULL in the target table; every array column uses
/// the default `;` delimiter and the price is a currency amount.
pub fn tea_profiles_schema() -> TableSchema {
    let text = |name: &str| required_or_optional(ColumnSpec::text(name));
    let array = |name: &str| required_or_optional(ColumnSpec::array(name));

    TableSchema::new(
        TEA_PROFILES_TABLE,
        vec![
            ColumnSpec::identifier(TeaProfileFields::ID),
            text(TeaProfileFields::NAME),
            array(TeaProfileFields::ALTERNATIVE_NAMES),
            text(TeaProfileFields::TEA_TYPE),
            array(TeaProfileFields::CULTIVARS),
            text(TeaProfileFields::PROCESSING),
            text(TeaProfileFields::OXIDATION_LEVEL),
            text(TeaProfileFields::CULTURAL_SIGNIFICANCE),
            text(TeaProfileFields::CULTURAL_SIGNIFICANCE_SOURCE),
            text(TeaProfileFields::COUNTRY_OF_ORIGIN),
            array(TeaProfileFields::SUBREGIONS),
            ColumnSpec::decimal(TeaProfileFields::AVG_PRICE_PER_OZ_USD, 7, 2).currency(),
            array(TeaProfileFields::LIQUOR_APPEARANCE),
            array(TeaProfileFields::LIQUOR_AROMA),
            array(TeaProfileFields::LIQUOR_TASTE),
            array(TeaProfileFields::LIQUOR_BODY_MOUTHFEEL),
            array(TeaProfileFields::BODY_EFFECT),
            array(TeaProfileFields::DRY_LEAF_APPEARANCE),
            array(TeaProfileFields::DRY_LEAF_AROMA),
            array(TeaProfileFields::WET_LEAF_APPEARANCE),
            array(TeaProfileFields::WET_LEAF_AROMA),
        ],
    )
}

/// Required columns as owned strings, as the pipeline takes them
pub fn required_tea_profile_fields() -> Vec<String> {
    REQUIRED_TEA_PROFILE_FIELDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Conflict columns as owned strings, as the pipeline takes them
pub fn tea_profile_conflict_columns() -> Vec<String> {
    TEA_PROFILE_CONFLICT_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn required_or_optional(column: ColumnSpec) -> ColumnSpec {
    if REQUIRED_TEA_PROFILE_FIELDS.contains(&column.name.as_str()) {
        column.not_null()
    } else {
        column
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::ColumnKind;

    #[test]
    fn test_schema_is_valid() {
        let schema = tea_profiles_schema();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.columns.len(), 21);
        assert_eq!(schema.data_columns().count(), 20);
    }

    #[test]
    fn test_required_fields_are_not_null() {
        let schema = tea_profiles_schema();
        for field in REQUIRED_TEA_PROFILE_FIELDS {
            let column = schema.column(field).unwrap();
            assert!(!column.nullable, "{} should be NOT NULL", field);
        }
        assert!(schema.column(TeaProfileFields::PROCESSING).unwrap().nullable);
    }

    #[test]
    fn test_price_is_currency() {
        let schema = tea_profiles_schema();
        let price = schema.column(TeaProfileFields::AVG_PRICE_PER_OZ_USD).unwrap();
        assert!(price.is_currency);
        assert!(matches!(price.kind, ColumnKind::Decimal { scale: 2, .. }));
    }

    #[test]
    fn test_conflict_columns_are_data_columns() {
        let schema = tea_profiles_schema();
        for column in tea_profile_conflict_columns() {
            assert!(schema.is_data_column(&column));
        }
    }
}
