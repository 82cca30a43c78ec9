//! Anomaly detection for combined pipeline tables.
//!
//! Three checks run over a table: schema columns that are missing, columns
//! without any value and numeric columns that are all zero. A full pass
//! repeats the same checks on every key partition.

pub mod checks;
pub mod error;
pub mod report;

use std::collections::HashMap;

use epi_ingest::cells_of;
use epi_model::{KEY_COLUMN, Schema};
use epi_transform::take_rows;
use polars::prelude::DataFrame;

pub use checks::{detect_correct_schema, detect_null_columns, detect_zero_columns};
pub use error::{Result, ValidateError};
pub use report::{Anomaly, AnomalyAction, AnomalyReport};

/// Run every check over the whole table.
pub fn detect_anomaly_all(schema: &Schema, df: &DataFrame, scope: &str) -> AnomalyReport {
    let mut report = AnomalyReport::new(scope);
    report.extend(detect_correct_schema(schema, df));
    report.extend(detect_null_columns(df));
    report.extend(detect_zero_columns(schema, df));
    report
}

/// Split `df` into one frame per distinct key, in first-appearance order.
/// Rows without a key are skipped; a table without a key column has no
/// partitions.
pub fn partition_by_key(df: &DataFrame) -> Result<Vec<(String, DataFrame)>> {
    let Ok(column) = df.column(KEY_COLUMN) else {
        return Ok(Vec::new());
    };
    let mut order: Vec<String> = Vec::new();
    let mut rows: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, cell) in cells_of(column).into_iter().enumerate() {
        let Some(key) = cell.render() else {
            continue;
        };
        rows.entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(idx);
    }
    order
        .into_iter()
        .map(|key| {
            let indices = rows.get(&key).map(Vec::as_slice).unwrap_or_default();
            let partition = take_rows(df, indices)?;
            Ok((key, partition))
        })
        .collect()
}

/// Every check over one partition from [`partition_by_key`], reported
/// under `<scope>/<key>`.
pub fn detect_anomaly_partition(
    schema: &Schema,
    scope: &str,
    key: &str,
    partition: &DataFrame,
) -> AnomalyReport {
    detect_anomaly_all(schema, partition, &format!("{scope}/{key}"))
}
