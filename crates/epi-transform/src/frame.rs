//! Row and column selection over polars frames.

use std::collections::BTreeMap;

use epi_ingest::{Cell, cells_of, cells_to_column, float_column, int_column, string_column};
use polars::prelude::{BooleanChunked, Column, DataFrame, DataType, NewChunkedArray};

use crate::cast::{safe_float_cast, safe_int_cast};
use crate::{Result, TransformError};

/// Build a column of `dtype` from cells. Values are cast to Int64, Float64
/// or String; any other dtype is inferred from the cells.
pub fn typed_column(name: &str, dtype: &DataType, cells: &[Cell]) -> Column {
    match dtype {
        DataType::Int64 => int_column(name, cells.iter().map(safe_int_cast).collect()),
        DataType::Float64 => float_column(name, cells.iter().map(safe_float_cast).collect()),
        DataType::String => string_column(name, cells.iter().map(Cell::render).collect()),
        _ => cells_to_column(name, cells),
    }
}

/// Keep the rows where `keep` is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

/// Reorder or repeat rows by index. Column dtypes are preserved.
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    if df.width() == 0 {
        return Ok(df.clone());
    }
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let cells = cells_of(column);
        let picked: Vec<Cell> = indices.iter().map(|idx| cells[*idx].clone()).collect();
        columns.push(typed_column(column.name().as_str(), column.dtype(), &picked));
    }
    Ok(DataFrame::new(columns)?)
}

/// Select `names` in the given order. Every name must exist.
pub fn select_columns<S: AsRef<str>>(df: &DataFrame, names: &[S]) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let column = df
            .column(name)
            .map_err(|_| TransformError::MissingColumn(name.to_string()))?;
        columns.push(column.clone());
    }
    Ok(DataFrame::new(columns)?)
}

/// Rename columns through `renames` (old name to new name). Names missing
/// from `df` are ignored.
pub fn rename_columns(df: &DataFrame, renames: &BTreeMap<String, String>) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| match renames.get(column.name().as_str()) {
            Some(target) => typed_column(target, column.dtype(), &cells_of(column)),
            None => column.clone(),
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Stack frames vertically. Columns follow first appearance; a column
/// missing from one input is null for its rows.
pub fn concat_frames(frames: &[DataFrame]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for frame in frames {
        for column in frame.get_columns() {
            let name = column.name().as_str();
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
    }
    if names.is_empty() {
        return Ok(DataFrame::empty());
    }
    let mut stacked: Vec<Vec<Cell>> = vec![Vec::new(); names.len()];
    for frame in frames {
        for (name, cells) in names.iter().zip(stacked.iter_mut()) {
            match frame.column(name) {
                Ok(column) => cells.extend(cells_of(column)),
                Err(_) => cells.extend(std::iter::repeat_n(Cell::Null, frame.height())),
            }
        }
    }
    let columns = names
        .iter()
        .zip(&stacked)
        .map(|(name, cells)| cells_to_column(name, cells))
        .collect();
    Ok(DataFrame::new(columns)?)
}
