//! Best-effort casting.
//!
//! Upstream sources format numbers and dates inconsistently, so every cast
//! here returns `None` instead of failing. Only [`ColumnType`] parsing can
//! reject a configuration.

use chrono::{NaiveDate, NaiveDateTime};
use epi_ingest::{Cell, cells_of, float_column, int_column, string_column};
use epi_model::ColumnType;
use polars::prelude::Column;
use tracing::warn;

const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses numeric text, dropping thousands separators and accepting the
/// Unicode minus sign.
pub fn parse_float_text(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| *c != ',')
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}

pub fn safe_float_cast(value: &Cell) -> Option<f64> {
    match value {
        Cell::Null => None,
        Cell::Int(v) => Some(*v as f64),
        Cell::Float(v) => (!v.is_nan()).then_some(*v),
        Cell::Text(text) => parse_float_text(text),
    }
}

/// Integer cast rounding half to even.
pub fn safe_int_cast(value: &Cell) -> Option<i64> {
    safe_int_cast_with(value, f64::round_ties_even)
}

/// Integer cast with a caller-provided rounding function.
///
/// Returns `None` when the value is not numeric or the rounded result does
/// not fit in an `i64`.
pub fn safe_int_cast_with<F>(value: &Cell, round: F) -> Option<i64>
where
    F: Fn(f64) -> f64,
{
    if let Cell::Int(v) = value {
        return Some(*v);
    }
    let rounded = round(safe_float_cast(value)?);
    if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

/// Parse `value` with a `strftime` style `format`, or as ISO-8601 when no
/// format is given. Date-only inputs resolve to midnight.
pub fn safe_datetime_parse(value: &str, format: Option<&str>, warn: bool) -> Option<NaiveDateTime> {
    let value = value.trim();
    let parsed = match format {
        Some(format) => parse_with_format(value, format),
        None => parse_iso(value),
    };
    if parsed.is_none() && warn {
        warn!(value, format = format.unwrap_or("ISO-8601"), "could not parse date");
    }
    parsed
}

fn parse_with_format(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    ISO_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Convert one cell to the representation of `dtype`.
pub fn convert_cell(value: &Cell, dtype: ColumnType) -> Cell {
    match dtype {
        ColumnType::NullableInt => safe_int_cast(value).into(),
        ColumnType::Float => safe_float_cast(value).into(),
        ColumnType::String => Cell::Text(value.render().unwrap_or_default()),
    }
}

/// Convert a whole column to `dtype`. Values that cannot be cast become
/// null; string columns render nulls as the empty string.
pub fn column_convert(column: &Column, dtype: ColumnType) -> Column {
    let name = column.name().as_str();
    let cells = cells_of(column);
    match dtype {
        ColumnType::NullableInt => int_column(name, cells.iter().map(safe_int_cast).collect()),
        ColumnType::Float => float_column(name, cells.iter().map(safe_float_cast).collect()),
        ColumnType::String => string_column(
            name,
            cells
                .iter()
                .map(|cell| Some(cell.render().unwrap_or_default()))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cast_cleans_text() {
        assert_eq!(safe_float_cast(&Cell::from("1,234.5")), Some(1234.5));
        assert_eq!(safe_float_cast(&Cell::from("\u{2212}3")), Some(-3.0));
        assert_eq!(safe_float_cast(&Cell::from("")), None);
        assert_eq!(safe_float_cast(&Cell::from("abc")), None);
        assert_eq!(safe_float_cast(&Cell::Float(f64::NAN)), None);
    }

    #[test]
    fn int_cast_rounds_half_to_even() {
        assert_eq!(safe_int_cast(&Cell::from("2.5")), Some(2));
        assert_eq!(safe_int_cast(&Cell::from("3.5")), Some(4));
        assert_eq!(safe_int_cast(&Cell::Float(1e30)), None);
        assert_eq!(safe_int_cast_with(&Cell::Float(2.9), f64::floor), Some(2));
    }
}
