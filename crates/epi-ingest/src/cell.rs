//! Polars value helpers.
//!
//! Table operations in this workspace work on owned [`Cell`] vectors pulled
//! out of polars columns and rebuild typed columns afterwards. This keeps
//! the row-level algorithms independent of the column dtypes adapters
//! happen to produce.

use std::cmp::Ordering;

use polars::prelude::{AnyValue, Column, DataFrame, IntoColumn, NamedFrom, Series};

use crate::Result;

/// One owned table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// NaN floats count as missing.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(v) => v.is_nan(),
            Self::Int(_) | Self::Text(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric value of an `Int` or non-NaN `Float` cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    /// Text rendering, `None` when missing.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) if v.is_nan() => None,
            Self::Float(v) => Some(format_numeric(*v)),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Total order used for sorting: nulls first, then numbers, then text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Text(_), _) => Ordering::Greater,
            (_, Self::Text(_)) => Ordering::Less,
            (a, b) => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
        }
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Int)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Float)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Converts a polars `AnyValue` into an owned [`Cell`].
pub fn any_to_cell(value: AnyValue<'_>) -> Cell {
    match value {
        AnyValue::Null => Cell::Null,
        AnyValue::Int8(v) => Cell::Int(i64::from(v)),
        AnyValue::Int16(v) => Cell::Int(i64::from(v)),
        AnyValue::Int32(v) => Cell::Int(i64::from(v)),
        AnyValue::Int64(v) => Cell::Int(v),
        AnyValue::UInt8(v) => Cell::Int(i64::from(v)),
        AnyValue::UInt16(v) => Cell::Int(i64::from(v)),
        AnyValue::UInt32(v) => Cell::Int(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
        AnyValue::Float32(v) => Cell::Float(f64::from(v)),
        AnyValue::Float64(v) => Cell::Float(v),
        AnyValue::String(s) => Cell::Text(s.to_string()),
        AnyValue::StringOwned(s) => Cell::Text(s.to_string()),
        AnyValue::Boolean(b) => Cell::Text(b.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

/// Formats a floating-point number as a string without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Column names of `df` as owned strings, in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_owned()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Extract every value of `column` as [`Cell`]s.
pub fn cells_of(column: &Column) -> Vec<Cell> {
    let mut values = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        values.push(any_to_cell(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    values
}

/// Extract every value of column `name` as [`Cell`]s.
pub fn column_cells(df: &DataFrame, name: &str) -> Result<Vec<Cell>> {
    Ok(cells_of(df.column(name)?))
}

pub fn int_column(name: &str, values: Vec<Option<i64>>) -> Column {
    Series::new(name.into(), values).into_column()
}

pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into_column()
}

pub fn string_column(name: &str, values: Vec<Option<String>>) -> Column {
    Series::new(name.into(), values).into_column()
}

/// Build a column from cells, picking the narrowest dtype that holds every
/// non-null value: Int64, then Float64, then String.
pub fn cells_to_column(name: &str, cells: &[Cell]) -> Column {
    let present = || cells.iter().filter(|cell| !cell.is_null());
    let has_values = present().next().is_some();
    if has_values && present().all(|cell| matches!(cell, Cell::Int(_))) {
        let values = cells
            .iter()
            .map(|cell| match cell {
                Cell::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        return int_column(name, values);
    }
    if has_values && present().all(|cell| matches!(cell, Cell::Int(_) | Cell::Float(_))) {
        return float_column(name, cells.iter().map(Cell::as_f64).collect());
    }
    string_column(name, cells.iter().map(Cell::render).collect())
}

/// Build a frame from named cell vectors. All vectors must share a length.
pub fn build_frame(columns: Vec<(String, Vec<Cell>)>) -> Result<DataFrame> {
    if columns.is_empty() {
        return Ok(DataFrame::empty());
    }
    let columns: Vec<Column> = columns
        .iter()
        .map(|(name, cells)| cells_to_column(name, cells))
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_null() {
        assert!(Cell::Float(f64::NAN).is_null());
        assert!(!Cell::Float(0.0).is_null());
        assert_eq!(Cell::Float(f64::NAN).render(), None);
    }

    #[test]
    fn ordering_puts_nulls_first() {
        let mut cells = vec![
            Cell::Text("b".into()),
            Cell::Int(3),
            Cell::Null,
            Cell::Float(1.5),
            Cell::Text("a".into()),
        ];
        cells.sort_by(Cell::total_cmp);
        assert_eq!(
            cells,
            vec![
                Cell::Null,
                Cell::Float(1.5),
                Cell::Int(3),
                Cell::Text("a".into()),
                Cell::Text("b".into()),
            ]
        );
    }

    #[test]
    fn numeric_format_drops_trailing_zeros() {
        assert_eq!(format_numeric(10.0), "10");
        assert_eq!(format_numeric(10.50), "10.5");
        assert_eq!(format_numeric(100.0), "100");
    }
}
