//! Tests for best-effort casting and schema conversion.

use chrono::NaiveDate;
use epi_ingest::{Cell, cells_of, string_column};
use epi_model::ColumnType;
use epi_transform::{
    column_convert, convert_cell, safe_datetime_parse, safe_float_cast, safe_int_cast,
};
use polars::prelude::DataType;
use proptest::prelude::*;

fn raw_column() -> polars::prelude::Column {
    string_column(
        "value",
        vec![
            Some("1,000".to_string()),
            Some("abc".to_string()),
            None,
            Some("2.5".to_string()),
        ],
    )
}

#[test]
fn column_convert_to_nullable_int() {
    let converted = column_convert(&raw_column(), ColumnType::NullableInt);
    assert_eq!(converted.dtype(), &DataType::Int64);
    assert_eq!(
        cells_of(&converted),
        vec![Cell::Int(1000), Cell::Null, Cell::Null, Cell::Int(2)]
    );
}

#[test]
fn column_convert_to_float() {
    let converted = column_convert(&raw_column(), ColumnType::Float);
    assert_eq!(converted.dtype(), &DataType::Float64);
    assert_eq!(
        cells_of(&converted),
        vec![Cell::Float(1000.0), Cell::Null, Cell::Null, Cell::Float(2.5)]
    );
}

#[test]
fn column_convert_to_string_fills_nulls() {
    let converted = column_convert(&raw_column(), ColumnType::String);
    assert_eq!(converted.dtype(), &DataType::String);
    assert_eq!(
        cells_of(&converted),
        vec![
            Cell::from("1,000"),
            Cell::from("abc"),
            Cell::from(""),
            Cell::from("2.5"),
        ]
    );
    assert_eq!(converted.name().as_str(), "value");
}

#[test]
fn convert_cell_matches_column_convert() {
    assert_eq!(convert_cell(&Cell::from("7"), ColumnType::NullableInt), Cell::Int(7));
    assert_eq!(convert_cell(&Cell::Null, ColumnType::Float), Cell::Null);
    assert_eq!(convert_cell(&Cell::Int(3), ColumnType::String), Cell::from("3"));
}

#[test]
fn datetime_parse_accepts_iso_inputs() {
    let midnight = NaiveDate::from_ymd_opt(2020, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(safe_datetime_parse("2020-03-01", None, false), Some(midnight));

    let parsed = safe_datetime_parse("2020-03-01T10:30:00", None, false).unwrap();
    assert_eq!(parsed.format("%H:%M").to_string(), "10:30");

    assert_eq!(safe_datetime_parse("2020-13-01", None, true), None);
    assert_eq!(safe_datetime_parse("01.03.2020", Some("%d.%m.%Y"), false), Some(midnight));
}

proptest! {
    #[test]
    fn float_cast_never_panics(text in ".*") {
        let _ = safe_float_cast(&Cell::Text(text));
    }

    #[test]
    fn int_cast_is_bounded(value in any::<f64>()) {
        match safe_int_cast(&Cell::Float(value)) {
            Some(cast) => prop_assert!((cast as f64 - value).abs() <= 0.5),
            None => prop_assert!(!value.is_finite() || value.abs() >= 9.2e18),
        }
    }
}
