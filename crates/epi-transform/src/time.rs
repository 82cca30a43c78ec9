use chrono::{Duration, NaiveDate};

use crate::cast::safe_datetime_parse;
use crate::{Result, TransformError};

/// Reformat a date written in `format` as an ISO `YYYY-MM-DD` string.
pub fn datetime_isoformat(value: &str, format: &str) -> Option<String> {
    safe_datetime_parse(value, Some(format), false)
        .map(|parsed| parsed.date().format("%Y-%m-%d").to_string())
}

/// Shift an ISO date by `days`.
pub fn date_offset(value: &str, days: i64) -> Result<String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| TransformError::InvalidDate(value.to_string()))?;
    let shifted = Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| TransformError::InvalidDate(value.to_string()))?;
    Ok(shifted.format("%Y-%m-%d").to_string())
}
