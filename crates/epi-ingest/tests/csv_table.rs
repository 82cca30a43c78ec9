//! Tests for CSV loading and export.

use std::fs;

use epi_ingest::{
    Cell, ReadOptions, build_frame, column_cells, column_names, read_csv_frame, read_table,
    write_csv,
};
use tempfile::tempdir;

#[test]
fn read_csv_frame_maps_null_markers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metadata.csv");
    fs::write(
        &path,
        "key, country_code ,subregion1_code\nAD,AD,\nAD_1,AD,1\nNA,NA,N/A\n",
    )
    .unwrap();

    let df = read_csv_frame(&path, &ReadOptions::default()).unwrap();
    assert_eq!(column_names(&df), vec!["key", "country_code", "subregion1_code"]);
    assert_eq!(df.height(), 3);

    let sub = column_cells(&df, "subregion1_code").unwrap();
    assert_eq!(sub, vec![Cell::Null, Cell::Text("1".into()), Cell::Null]);

    // Namibia's country code must survive as text.
    let keys = column_cells(&df, "key").unwrap();
    assert_eq!(keys[2], Cell::Text("NA".into()));
}

#[test]
fn read_csv_frame_pads_short_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.csv");
    fs::write(&path, "a,b,c\n1,2\n\n4,5,6\n").unwrap();

    let df = read_csv_frame(&path, &ReadOptions::default()).unwrap();
    assert_eq!(df.height(), 2);
    assert_eq!(
        column_cells(&df, "c").unwrap(),
        vec![Cell::Null, Cell::Text("6".into())]
    );
}

#[test]
fn read_table_rejects_unknown_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.xyz");
    fs::write(&path, "a\n1\n").unwrap();
    assert!(read_table(&path, &ReadOptions::default()).is_err());
}

#[test]
fn read_table_handles_tsv() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.tsv");
    fs::write(&path, "date\tvalue\n2020-01-01\t5\n").unwrap();
    let df = read_table(&path, &ReadOptions::default()).unwrap();
    assert_eq!(column_names(&df), vec!["date", "value"]);
}

#[test]
fn write_csv_renders_nulls_and_numbers() {
    let df = build_frame(vec![
        (
            "date".to_string(),
            vec![Cell::from("2020-01-01"), Cell::from("2020-01-02")],
        ),
        ("key".to_string(), vec![Cell::from("US"), Cell::from("US")]),
        ("total".to_string(), vec![Cell::Int(10), Cell::Null]),
        ("rate".to_string(), vec![Cell::Float(0.5), Cell::Float(2.0)]),
    ])
    .unwrap();

    let mut buffer = Vec::new();
    write_csv(&df, &mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    insta::assert_snapshot!(text.trim_end(), @r"
    date,key,total,rate
    2020-01-01,US,10,0.5
    2020-01-02,US,,2
    ");
}
