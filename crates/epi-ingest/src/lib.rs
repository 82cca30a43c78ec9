//! Tabular ingest and export for the epidemiology pipeline.
//!
//! - **cell**: conversions between polars columns and owned [`Cell`] values
//! - **csv_table**: CSV to [`DataFrame`](polars::prelude::DataFrame) loading
//! - **export**: CSV writing of finished tables

pub mod cell;
pub mod csv_table;
pub mod error;
pub mod export;

pub use cell::{
    Cell, any_to_cell, build_frame, cells_of, cells_to_column, column_cells,
    column_names, float_column, format_numeric, int_column, string_column,
};
pub use csv_table::{DEFAULT_NULL_VALUES, ReadOptions, read_csv_frame, read_table};
pub use error::{IngestError, Result};
pub use export::{write_csv, write_csv_table};
