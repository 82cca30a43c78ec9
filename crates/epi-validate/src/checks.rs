//! Table-wide anomaly checks.
//!
//! Each check returns its findings; callers decide whether they are fatal.

use epi_ingest::{Cell, cells_of, column_names};
use epi_model::Schema;
use epi_transform::safe_float_cast;
use polars::prelude::{DataFrame, DataType};

use crate::report::Anomaly;

/// Schema columns absent from `df`.
pub fn detect_correct_schema(schema: &Schema, df: &DataFrame) -> Vec<Anomaly> {
    let present = column_names(df);
    let columns: Vec<String> = schema
        .names()
        .into_iter()
        .filter(|name| !present.iter().any(|column| column == name))
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        Vec::new()
    } else {
        vec![Anomaly::MissingColumns { columns }]
    }
}

fn has_value(cell: &Cell) -> bool {
    match cell {
        Cell::Text(text) => !text.trim().is_empty(),
        other => !other.is_null(),
    }
}

/// Columns without a single value. Empty strings count as missing.
pub fn detect_null_columns(df: &DataFrame) -> Vec<Anomaly> {
    if df.height() == 0 {
        return Vec::new();
    }
    df.get_columns()
        .iter()
        .filter(|column| !cells_of(column).iter().any(has_value))
        .map(|column| Anomaly::NullColumn {
            column: column.name().to_string(),
        })
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Numeric columns whose absolute values sum to less than one. A column is
/// numeric when its dtype is, or when `schema` declares it so.
pub fn detect_zero_columns(schema: &Schema, df: &DataFrame) -> Vec<Anomaly> {
    if df.height() == 0 {
        return Vec::new();
    }
    df.get_columns()
        .iter()
        .filter(|column| {
            is_numeric(column.dtype())
                || schema
                    .get(column.name().as_str())
                    .is_some_and(|dtype| dtype.is_numeric())
        })
        .filter(|column| {
            let total: f64 = cells_of(column)
                .iter()
                .map(|cell| safe_float_cast(cell).unwrap_or(0.0).abs())
                .sum();
            total < 1.0
        })
        .map(|column| Anomaly::ZeroColumn {
            column: column.name().to_string(),
        })
        .collect()
}
