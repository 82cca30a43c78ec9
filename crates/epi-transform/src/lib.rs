//! Data transformation utilities for the epidemiology pipeline.
//!
//! - **cast**: best-effort value casting and schema column conversion
//! - **table**: combining, pivoting and grouped daily/cumulative transforms
//! - **frame**: row selection helpers over polars frames
//! - **text**: fuzzy text normalization used by key resolution
//! - **time**: ISO date helpers

pub mod cast;
pub mod error;
pub mod frame;
pub mod table;
pub mod text;
pub mod time;

pub use cast::{
    column_convert, convert_cell, parse_float_text, safe_datetime_parse, safe_float_cast,
    safe_int_cast, safe_int_cast_with,
};
pub use error::{Result, TransformError};
pub use frame::{
    concat_frames, filter_rows, rename_columns, select_columns, take_rows, typed_column,
};
pub use table::{
    agg_last_not_null, combine_tables, drop_na_records, grouped_cumsum, grouped_diff,
    grouped_transform, infer_new_and_total, pivot_table, sort_table,
};
pub use text::fuzzy_text;
pub use time::{date_offset, datetime_isoformat};
