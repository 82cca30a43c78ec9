//! Tests for epi-model types.

use epi_model::{
    ColumnType, Criterion, KeyLevel, LocationField, MergeRecord, ModelError, Schema, key_level,
    parent_key,
};

#[test]
fn column_type_accepts_config_names() {
    assert_eq!(ColumnType::parse("int").unwrap(), ColumnType::NullableInt);
    assert_eq!(ColumnType::parse("Int64").unwrap(), ColumnType::NullableInt);
    assert_eq!(ColumnType::parse("float").unwrap(), ColumnType::Float);
    assert_eq!(ColumnType::parse("str").unwrap(), ColumnType::String);
    assert_eq!(" string ".parse::<ColumnType>().unwrap(), ColumnType::String);
}

#[test]
fn column_type_rejects_unknown_dtype() {
    let err = ColumnType::parse("datetime64").unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedDtype(name) if name == "datetime64"));
}

#[test]
fn schema_keeps_declaration_order() {
    let schema = Schema::from_pairs([
        ("date", "str"),
        ("key", "str"),
        ("new_confirmed", "int"),
        ("rate", "float"),
    ])
    .unwrap();
    assert_eq!(schema.names(), vec!["date", "key", "new_confirmed", "rate"]);
    assert_eq!(schema.get("rate"), Some(ColumnType::Float));
    assert!(schema.get("missing").is_none());
}

#[test]
fn schema_rejects_duplicates() {
    let err = Schema::from_pairs([("date", "str"), ("date", "str")]).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateColumn(_)));
}

#[test]
fn key_levels_follow_prefix_convention() {
    assert_eq!(key_level("ES").unwrap(), KeyLevel::Country);
    assert_eq!(key_level("ES_MD").unwrap(), KeyLevel::Subregion1);
    assert_eq!(key_level("US_CA_06037").unwrap(), KeyLevel::Subregion2);
    assert!(key_level("US__X").is_err());
    assert!(key_level("A_B_C_D").is_err());
}

#[test]
fn parent_key_strips_last_segment() {
    assert_eq!(parent_key("US_CA_06037"), Some("US_CA"));
    assert_eq!(parent_key("US_CA"), Some("US"));
    assert_eq!(parent_key("US"), None);
}

#[test]
fn criterion_restrictiveness() {
    assert!(!Criterion::Unset.is_restrictive());
    assert!(Criterion::Null.is_restrictive());
    assert!(!Criterion::Value(String::new()).is_restrictive());
    assert!(Criterion::Value("AD".to_string()).is_restrictive());
    assert_eq!(Criterion::from_cell(None), Criterion::Null);
}

#[test]
fn merge_record_display_lists_set_fields() {
    let record = MergeRecord::new()
        .with_value(LocationField::CountryCode, "AD")
        .with_null(LocationField::Subregion1Code)
        .with_match_string("Madrid");
    assert_eq!(
        record.to_string(),
        "{country_code=\"AD\", subregion1_code=null, match_string=\"Madrid\"}"
    );
    assert_eq!(record.get(LocationField::Subregion2Name), &Criterion::Unset);
}
