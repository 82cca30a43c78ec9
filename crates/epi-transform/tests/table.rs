//! Tests for table combination and grouped transforms.

use epi_ingest::{Cell, build_frame, column_cells, column_names, int_column, string_column};
use epi_transform::{
    TransformError, combine_tables, drop_na_records, grouped_cumsum, grouped_diff,
    infer_new_and_total, pivot_table, sort_table,
};
use polars::prelude::DataFrame;
use proptest::prelude::*;

fn text(values: &[&str]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

fn ints(values: &[Option<i64>]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

fn frame(columns: Vec<(&str, Vec<Cell>)>) -> DataFrame {
    build_frame(
        columns
            .into_iter()
            .map(|(name, cells)| (name.to_string(), cells))
            .collect(),
    )
    .unwrap()
}

fn all_cells(df: &DataFrame) -> Vec<(String, Vec<Cell>)> {
    column_names(df)
        .into_iter()
        .map(|name| {
            let cells = column_cells(df, &name).unwrap();
            (name, cells)
        })
        .collect()
}

#[test]
fn combine_keeps_right_most_non_null() {
    let first = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["US", "US"])),
        ("total", ints(&[Some(1), Some(2)])),
    ]);
    let second = frame(vec![
        ("date", text(&["2020-01-02", "2020-01-01"])),
        ("key", text(&["US", "US"])),
        ("total", ints(&[Some(5), None])),
        ("rate", vec![Cell::Float(0.5), Cell::Null]),
    ]);

    let combined = combine_tables(&[first, second], &["date", "key"]).unwrap();
    assert_eq!(column_names(&combined), vec!["date", "key", "total", "rate"]);
    assert_eq!(combined.height(), 2);
    assert_eq!(
        column_cells(&combined, "total").unwrap(),
        ints(&[Some(1), Some(5)])
    );
    assert_eq!(
        column_cells(&combined, "rate").unwrap(),
        vec![Cell::Null, Cell::Float(0.5)]
    );
}

#[test]
fn combine_uses_only_present_keys() {
    let table = frame(vec![
        ("key", text(&["ES", "ES", "FR"])),
        ("population", ints(&[None, Some(47), Some(67)])),
    ]);
    let combined = combine_tables(&[table], &["date", "key"]).unwrap();
    assert_eq!(combined.height(), 2);
    assert_eq!(
        column_cells(&combined, "population").unwrap(),
        ints(&[Some(47), Some(67)])
    );
}

#[test]
fn combine_of_nothing_is_empty() {
    let combined = combine_tables(&[], &["date", "key"]).unwrap();
    assert_eq!(combined.height(), 0);
    assert_eq!(combined.width(), 0);
}

#[test]
fn pivot_turns_columns_into_records() {
    let wide = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("US", ints(&[Some(1), Some(2)])),
        ("ES", ints(&[Some(3), None])),
    ]);
    let long = pivot_table(&wide, "date", "key").unwrap();
    assert_eq!(column_names(&long), vec!["date", "key", "value"]);
    assert_eq!(
        column_cells(&long, "key").unwrap(),
        text(&["US", "US", "ES", "ES"])
    );
    assert_eq!(
        column_cells(&long, "value").unwrap(),
        ints(&[Some(1), Some(2), Some(3), None])
    );
}

#[test]
fn grouped_diff_sorts_and_drops_leading_rows() {
    let data = frame(vec![
        (
            "date",
            text(&["2020-01-02", "2020-01-01", "2020-01-03", "2020-01-02", "2020-01-01"]),
        ),
        ("key", text(&["A", "A", "A", "B", "B"])),
        ("total", ints(&[Some(3), Some(1), Some(6), Some(10), Some(10)])),
    ]);
    let diff = grouped_diff(&data, &["key", "date"], &[], None).unwrap();
    assert_eq!(
        column_cells(&diff, "date").unwrap(),
        text(&["2020-01-02", "2020-01-03", "2020-01-02"])
    );
    assert_eq!(column_cells(&diff, "key").unwrap(), text(&["A", "A", "B"]));
    assert_eq!(
        column_cells(&diff, "total").unwrap(),
        ints(&[Some(2), Some(3), Some(0)])
    );
}

#[test]
fn grouped_diff_with_prefix_renames_and_selects() {
    let data = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["A", "A"])),
        ("total_confirmed", ints(&[Some(1), Some(4)])),
        ("population", ints(&[Some(100), Some(100)])),
    ]);
    let diff = grouped_diff(&data, &["key", "date"], &[], Some(("total_", "new_"))).unwrap();
    assert_eq!(column_names(&diff), vec!["date", "key", "new_confirmed"]);
    assert_eq!(column_cells(&diff, "new_confirmed").unwrap(), ints(&[Some(3)]));
}

#[test]
fn grouped_diff_passes_skip_columns_through() {
    let data = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["A", "A"])),
        ("total", ints(&[Some(1), Some(4)])),
        ("population", ints(&[Some(100), Some(100)])),
    ]);
    let diff = grouped_diff(&data, &["key", "date"], &["population"], None).unwrap();
    assert_eq!(diff.height(), 2);
    assert_eq!(
        column_cells(&diff, "population").unwrap(),
        ints(&[Some(100), Some(100)])
    );
    assert_eq!(column_cells(&diff, "total").unwrap(), ints(&[None, Some(3)]));
}

#[test]
fn grouped_diff_drops_leading_row_when_skip_columns_are_null() {
    let data = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["A", "A"])),
        ("total", ints(&[Some(1), Some(4)])),
        ("population", ints(&[None, Some(100)])),
    ]);
    let diff = grouped_diff(&data, &["key", "date"], &["population"], None).unwrap();
    assert_eq!(column_cells(&diff, "date").unwrap(), text(&["2020-01-02"]));
}

#[test]
fn grouped_transform_requires_date_last() {
    let data = frame(vec![
        ("date", text(&["2020-01-01"])),
        ("key", text(&["A"])),
        ("total", ints(&[Some(1)])),
    ]);
    let err = grouped_cumsum(&data, &["date", "key"], &[], None).unwrap_err();
    assert!(matches!(err, TransformError::DateKeyNotLast(Some(key)) if key == "key"));
}

#[test]
fn infer_adds_missing_counterparts_in_place() {
    let data = frame(vec![
        ("key", text(&["A", "A", "B"])),
        ("date", text(&["2020-01-02", "2020-01-01", "2020-01-01"])),
        ("total_x", ints(&[Some(3), Some(1), Some(5)])),
        ("new_y", ints(&[Some(1), Some(2), Some(3)])),
    ]);
    let inferred = infer_new_and_total(&data).unwrap();
    assert_eq!(
        column_names(&inferred),
        vec!["key", "date", "total_x", "new_y", "new_x", "total_y"]
    );
    assert_eq!(
        column_cells(&inferred, "new_x").unwrap(),
        ints(&[Some(2), None, None])
    );
    assert_eq!(
        column_cells(&inferred, "total_y").unwrap(),
        ints(&[Some(3), Some(2), Some(3)])
    );
}

#[test]
fn infer_leaves_complete_pairs_alone() {
    let data = frame(vec![
        ("key", text(&["A"])),
        ("date", text(&["2020-01-01"])),
        ("new_x", ints(&[Some(7)])),
        ("total_x", ints(&[Some(9)])),
    ]);
    let inferred = infer_new_and_total(&data).unwrap();
    assert_eq!(all_cells(&inferred), all_cells(&data));
}

#[test]
fn drop_na_records_ignores_key_columns() {
    let data = frame(vec![
        ("date", text(&["2020-01-02", "2020-01-01", "2020-01-01"])),
        ("key", text(&["B", "A", "B"])),
        ("value", ints(&[None, Some(1), None])),
    ]);
    let kept = drop_na_records(&data, &["date", "key"]).unwrap();
    assert_eq!(kept.height(), 1);
    assert_eq!(column_cells(&kept, "key").unwrap(), text(&["A"]));
}

#[test]
fn sort_table_orders_nulls_first() {
    let data = frame(vec![
        ("key", vec![Cell::from("B"), Cell::from("A"), Cell::Null]),
        ("value", ints(&[Some(2), Some(1), Some(0)])),
    ]);
    let sorted = sort_table(&data, &["key", "value"]).unwrap();
    assert_eq!(
        column_cells(&sorted, "value").unwrap(),
        ints(&[Some(0), Some(1), Some(2)])
    );
}

fn table_from_rows(rows: &[(u8, u8, Option<i64>)]) -> DataFrame {
    DataFrame::new(vec![
        string_column(
            "date",
            rows.iter()
                .map(|(_, date, _)| Some(format!("2020-01-{:02}", date + 1)))
                .collect(),
        ),
        string_column(
            "key",
            rows.iter().map(|(key, _, _)| Some(format!("K{key}"))).collect(),
        ),
        int_column("value", rows.iter().map(|(_, _, value)| *value).collect()),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn combine_is_idempotent(
        rows in prop::collection::vec((0u8..3, 0u8..4, prop::option::of(-50i64..50)), 0..20)
    ) {
        let table = table_from_rows(&rows);
        let once = combine_tables(&[table.clone()], &["date", "key"]).unwrap();
        let twice = combine_tables(&[table.clone(), table], &["date", "key"]).unwrap();
        prop_assert_eq!(all_cells(&once), all_cells(&twice));
    }

    #[test]
    fn diff_inverts_cumsum(daily in prop::collection::vec(0i64..1000, 1..12)) {
        let rows: Vec<(u8, u8, Option<i64>)> = daily
            .iter()
            .enumerate()
            .map(|(idx, value)| (0, idx as u8, Some(*value)))
            .collect();
        let data = table_from_rows(&rows);
        let totals = grouped_cumsum(&data, &["key", "date"], &[], None).unwrap();
        prop_assert_eq!(totals.height(), daily.len());
        let back = grouped_diff(&totals, &["key", "date"], &[], None).unwrap();
        let expected: Vec<Cell> = daily[1..].iter().map(|v| Cell::Int(*v)).collect();
        prop_assert_eq!(column_cells(&back, "value").unwrap(), expected);
    }
}
