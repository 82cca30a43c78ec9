//! Tests for the anomaly detector.

use epi_ingest::{Cell, build_frame, column_cells};
use epi_model::Schema;
use epi_validate::{
    Anomaly, AnomalyAction, ValidateError, detect_anomaly_all, detect_anomaly_partition,
    partition_by_key,
};
use polars::prelude::DataFrame;

fn schema() -> Schema {
    Schema::from_pairs([
        ("date", "str"),
        ("key", "str"),
        ("total", "int"),
        ("rate", "float"),
    ])
    .unwrap()
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

fn text(values: &[&str]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

#[test]
fn clean_table_has_no_findings() {
    let df = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["US", "US"])),
        ("total", vec![Cell::Int(1), Cell::Int(3)]),
        ("rate", vec![Cell::Float(1.5), Cell::Null]),
    ]);
    let report = detect_anomaly_all(&schema(), &df, "epidemiology");
    assert!(report.is_clean(), "{:?}", report.anomalies);
    assert!(report.apply(AnomalyAction::Raise).is_ok());
}

#[test]
fn detects_missing_null_and_zero_columns() {
    let df = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02"])),
        ("key", text(&["US", "US"])),
        ("total", vec![Cell::Int(0), Cell::Null]),
        ("notes", text(&["", " "])),
    ]);
    let report = detect_anomaly_all(&schema(), &df, "epidemiology");
    assert_eq!(
        report.anomalies,
        vec![
            Anomaly::MissingColumns {
                columns: vec!["rate".to_string()]
            },
            Anomaly::NullColumn {
                column: "notes".to_string()
            },
            Anomaly::ZeroColumn {
                column: "total".to_string()
            },
        ]
    );
}

#[test]
fn raise_turns_findings_into_errors() {
    let df = frame(vec![
        ("date", text(&["2020-01-01"])),
        ("key", text(&["US"])),
        ("total", vec![Cell::Int(0)]),
        ("rate", vec![Cell::Float(2.0)]),
    ]);
    let report = detect_anomaly_all(&schema(), &df, "epidemiology");
    assert!(report.apply(AnomalyAction::Warn).is_ok());
    let err = report.apply(AnomalyAction::Raise).unwrap_err();
    assert!(matches!(
        err,
        ValidateError::Anomaly { scope, message }
            if scope == "epidemiology" && message.contains("total")
    ));
}

#[test]
fn partitions_follow_first_appearance() {
    let df = frame(vec![
        ("key", vec![Cell::from("US"), Cell::from("ES"), Cell::Null, Cell::from("US")]),
        ("total", vec![Cell::Int(1), Cell::Int(2), Cell::Int(3), Cell::Int(4)]),
    ]);
    let partitions = partition_by_key(&df).unwrap();
    let keys: Vec<&str> = partitions.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["US", "ES"]);
    assert_eq!(
        column_cells(&partitions[0].1, "total").unwrap(),
        vec![Cell::Int(1), Cell::Int(4)]
    );
}

#[test]
fn per_key_pass_finds_local_anomalies() {
    let df = frame(vec![
        ("date", text(&["2020-01-01", "2020-01-02", "2020-01-01"])),
        ("key", text(&["US", "US", "ES"])),
        ("total", vec![Cell::Int(0), Cell::Int(0), Cell::Int(5)]),
        ("rate", vec![Cell::Float(1.5), Cell::Float(1.5), Cell::Float(2.0)]),
    ]);
    assert!(detect_anomaly_all(&schema(), &df, "epidemiology").is_clean());

    let reports: Vec<_> = partition_by_key(&df)
        .unwrap()
        .iter()
        .map(|(key, partition)| detect_anomaly_partition(&schema(), "epidemiology", key, partition))
        .collect();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].scope, "epidemiology/US");
    assert_eq!(
        reports[0].anomalies,
        vec![Anomaly::ZeroColumn {
            column: "total".to_string()
        }]
    );
    assert!(reports[1].is_clean());
}

#[test]
fn anomalies_serialize_with_kind_tag() {
    let anomaly = Anomaly::NullColumn {
        column: "notes".to_string(),
    };
    let json = serde_json::to_string(&anomaly).unwrap();
    assert_eq!(json, r#"{"kind":"null_column","column":"notes"}"#);
}
