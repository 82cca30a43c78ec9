use std::collections::BTreeMap;

use epi_ingest::{Cell, column_cells, column_names, int_column, string_column};
use epi_transform::{concat_frames, rename_columns, select_columns, take_rows};
use polars::prelude::{DataFrame, DataType};

fn sample() -> DataFrame {
    DataFrame::new(vec![
        string_column("region", vec![Some("a".into()), Some("b".into())]),
        int_column("cases", vec![None, None]),
    ])
    .unwrap()
}

#[test]
fn take_rows_keeps_dtype_of_null_columns() {
    let taken = take_rows(&sample(), &[1, 1, 0]).unwrap();
    assert_eq!(taken.column("cases").unwrap().dtype(), &DataType::Int64);
    assert_eq!(
        column_cells(&taken, "region").unwrap(),
        vec![Cell::from("b"), Cell::from("b"), Cell::from("a")]
    );
}

#[test]
fn rename_ignores_unknown_columns() {
    let renames = BTreeMap::from([
        ("region".to_string(), "subregion1_name".to_string()),
        ("missing".to_string(), "other".to_string()),
    ]);
    let renamed = rename_columns(&sample(), &renames).unwrap();
    assert_eq!(column_names(&renamed), vec!["subregion1_name", "cases"]);
}

#[test]
fn concat_fills_missing_columns() {
    let other = DataFrame::new(vec![
        string_column("region", vec![Some("c".into())]),
        int_column("deaths", vec![Some(4)]),
    ])
    .unwrap();
    let stacked = concat_frames(&[sample(), other]).unwrap();
    assert_eq!(column_names(&stacked), vec!["region", "cases", "deaths"]);
    assert_eq!(stacked.height(), 3);
    assert_eq!(
        column_cells(&stacked, "deaths").unwrap(),
        vec![Cell::Null, Cell::Null, Cell::Int(4)]
    );
}

#[test]
fn select_requires_every_column() {
    assert!(select_columns(&sample(), &["cases", "region"]).is_ok());
    assert!(select_columns(&sample(), &["cases", "missing"]).is_err());
}
