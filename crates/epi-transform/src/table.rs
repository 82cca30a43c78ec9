//! Table-level operations shared by adapters and the chain.
//!
//! Every function here takes frames by reference and returns a new frame.
//! Grouping compares rendered cell values, so an `Int(1)` and a `Text("1")`
//! key land in the same group.

use std::cmp::Ordering;
use std::collections::HashMap;

use epi_ingest::{
    Cell, cells_of, cells_to_column, column_names, float_column, int_column, string_column,
};
use epi_model::{DATE_COLUMN, KEY_COLUMN};
use polars::prelude::{Column, DataFrame, DataType};
use tracing::debug;

use crate::cast::safe_float_cast;
use crate::frame::{filter_rows, take_rows, typed_column};
use crate::{Result, TransformError};

type GroupKey = Vec<Option<String>>;
type SeriesFn = fn(&[Option<f64>]) -> Vec<Option<f64>>;

fn cells_by_name(df: &DataFrame, name: &str) -> Result<Vec<Cell>> {
    df.column(name)
        .map(cells_of)
        .map_err(|_| TransformError::MissingColumn(name.to_string()))
}

fn group_key(columns: &[Vec<Cell>], row: usize) -> GroupKey {
    columns.iter().map(|cells| cells[row].render()).collect()
}

/// Stable row order sorted by `columns`, compared left to right.
fn sorted_indices(columns: &[Vec<Cell>], height: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..height).collect();
    indices.sort_by(|a, b| {
        columns
            .iter()
            .map(|cells| cells[*a].total_cmp(&cells[*b]))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    indices
}

/// Split a sorted row order into runs sharing the same `group_columns`.
fn group_runs(order: &[usize], group_columns: &[Vec<Cell>]) -> Vec<Vec<usize>> {
    let mut runs: Vec<Vec<usize>> = Vec::new();
    let mut current: Option<GroupKey> = None;
    for &row in order {
        let key = group_key(group_columns, row);
        match runs.last_mut() {
            Some(run) if current.as_ref() == Some(&key) => run.push(row),
            _ => {
                runs.push(vec![row]);
                current = Some(key);
            }
        }
    }
    runs
}

/// Apply `transform` to each group of `values`. Results are indexed by the
/// original row. Columns without any value stay entirely null.
fn transform_groups<F>(
    values: &[Option<f64>],
    groups: &[Vec<usize>],
    transform: &F,
) -> Vec<Option<f64>>
where
    F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
{
    let mut out = vec![None; values.len()];
    if values.iter().all(Option::is_none) {
        return out;
    }
    for group in groups {
        let slice: Vec<Option<f64>> = group.iter().map(|row| values[*row]).collect();
        for (row, value) in group.iter().zip(transform(&slice)) {
            out[*row] = value;
        }
    }
    out
}

/// Whether derived values of `column` should be written back as integers.
fn integral_source(column: &Column, values: &[Option<f64>]) -> bool {
    column.dtype() != &DataType::Float64 && values.iter().flatten().all(|v| v.fract() == 0.0)
}

fn numeric_column(name: &str, integral: bool, values: Vec<Option<f64>>) -> Column {
    if integral {
        let values = values
            .into_iter()
            .map(|value| value.filter(|v| v.is_finite()).map(|v| v.round() as i64))
            .collect();
        int_column(name, values)
    } else {
        float_column(name, values)
    }
}

fn diff_values(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut previous: Option<f64> = None;
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let current = value.or(previous);
        out.push(match (previous, current) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        });
        previous = current;
    }
    out
}

fn cumsum_values(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut total = 0.0;
    values
        .iter()
        .map(|value| {
            total += value.unwrap_or(0.0);
            Some(total)
        })
        .collect()
}

/// Turn a wide table (one column per entity, `index_column` holding the
/// date) into long `(date, pivot_name, value)` records, column by column.
pub fn pivot_table(data: &DataFrame, index_column: &str, pivot_name: &str) -> Result<DataFrame> {
    let index = cells_by_name(data, index_column)?;
    let mut dates = Vec::new();
    let mut pivots = Vec::new();
    let mut values = Vec::new();
    for column in data.get_columns() {
        let name = column.name().as_str();
        if name == index_column {
            continue;
        }
        for (date, value) in index.iter().zip(cells_of(column)) {
            dates.push(date.render());
            pivots.push(Some(name.to_string()));
            values.push(value);
        }
    }
    Ok(DataFrame::new(vec![
        string_column(DATE_COLUMN, dates),
        string_column(pivot_name, pivots),
        cells_to_column("value", &values),
    ])?)
}

/// Right-most non-null value, or null.
pub fn agg_last_not_null(values: &[Cell]) -> Cell {
    values
        .iter()
        .rev()
        .find(|value| !value.is_null())
        .cloned()
        .unwrap_or(Cell::Null)
}

/// Combine `tables` into one row per distinct tuple of `keys`, keeping for
/// every other column the right-most non-null value across all inputs.
///
/// Only the keys present in at least one table are used. Output rows follow
/// the first appearance of each key tuple; columns follow first appearance
/// across the inputs.
pub fn combine_tables<S: AsRef<str>>(tables: &[DataFrame], keys: &[S]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    // `None` marks a column whose dtype differs between inputs.
    let mut dtypes: Vec<Option<DataType>> = Vec::new();
    for table in tables {
        for column in table.get_columns() {
            let name = column.name().as_str();
            match names.iter().position(|existing| existing == name) {
                Some(pos) => {
                    if dtypes[pos].as_ref() != Some(column.dtype()) {
                        dtypes[pos] = None;
                    }
                }
                None => {
                    names.push(name.to_string());
                    dtypes.push(Some(column.dtype().clone()));
                }
            }
        }
    }
    if names.is_empty() {
        return Ok(DataFrame::empty());
    }

    let key_positions: Vec<usize> = keys
        .iter()
        .filter_map(|key| names.iter().position(|name| name == key.as_ref()))
        .collect();
    if key_positions.is_empty() {
        let wanted: Vec<&str> = keys.iter().map(|key| key.as_ref()).collect();
        return Err(TransformError::MissingColumn(wanted.join(", ")));
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    for table in tables {
        let columns: Vec<Option<Vec<Cell>>> = names
            .iter()
            .map(|name| table.column(name).ok().map(cells_of))
            .collect();
        for row in 0..table.height() {
            let key: GroupKey = key_positions
                .iter()
                .map(|pos| columns[*pos].as_ref().and_then(|cells| cells[row].render()))
                .collect();
            let slot = *index.entry(key).or_insert_with(|| {
                rows.push(vec![Cell::Null; names.len()]);
                rows.len() - 1
            });
            for (pos, cells) in columns.iter().enumerate() {
                if let Some(value) = cells.as_ref().map(|cells| &cells[row])
                    && !value.is_null()
                {
                    rows[slot][pos] = value.clone();
                }
            }
        }
    }

    debug!(tables = tables.len(), rows = rows.len(), "combined tables");
    let columns = names
        .iter()
        .enumerate()
        .map(|(pos, name)| {
            let cells: Vec<Cell> = rows.iter().map(|row| row[pos].clone()).collect();
            match &dtypes[pos] {
                Some(dtype) => typed_column(name, dtype, &cells),
                None => cells_to_column(name, &cells),
            }
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Apply `transform` to every value column, per group of all keys but the
/// last, with rows ordered by `keys`.
///
/// The last key must be `date`. Columns listed in `skip` pass through
/// unchanged. With `prefix = Some((input, output))` only columns starting
/// with `input` are transformed and they are renamed to start with
/// `output`; other non-key columns are dropped. Rows where every
/// transformed column ends up null are dropped unless a skipped column
/// holds a value on that row.
pub fn grouped_transform<F>(
    data: &DataFrame,
    keys: &[&str],
    transform: F,
    skip: &[&str],
    prefix: Option<(&str, &str)>,
) -> Result<DataFrame>
where
    F: Fn(&[Option<f64>]) -> Vec<Option<f64>>,
{
    if keys.last() != Some(&DATE_COLUMN) {
        return Err(TransformError::DateKeyNotLast(
            keys.last().map(|key| (*key).to_string()),
        ));
    }
    let key_cells = keys
        .iter()
        .map(|key| cells_by_name(data, key))
        .collect::<Result<Vec<_>>>()?;
    let order = sorted_indices(&key_cells, data.height());
    let groups = group_runs(&order, &key_cells[..key_cells.len() - 1]);

    let mut columns: Vec<Column> = Vec::with_capacity(data.width());
    let mut transformed: Vec<Vec<Option<f64>>> = Vec::new();
    let mut skipped: Vec<Vec<bool>> = Vec::new();
    for column in data.get_columns() {
        let name = column.name().as_str();
        let cells = cells_of(column);
        if keys.contains(&name) || skip.contains(&name) {
            let picked: Vec<Cell> = order.iter().map(|row| cells[*row].clone()).collect();
            if !keys.contains(&name) {
                skipped.push(picked.iter().map(|cell| !cell.is_null()).collect());
            }
            columns.push(typed_column(name, column.dtype(), &picked));
            continue;
        }
        let output_name = match prefix {
            Some((input, output)) => match name.strip_prefix(input) {
                Some(rest) => format!("{output}{rest}"),
                None => continue,
            },
            None => name.to_string(),
        };
        let values: Vec<Option<f64>> = cells.iter().map(safe_float_cast).collect();
        let integral = integral_source(column, &values);
        let derived = transform_groups(&values, &groups, &transform);
        let ordered: Vec<Option<f64>> = order.iter().map(|row| derived[*row]).collect();
        columns.push(numeric_column(&output_name, integral, ordered.clone()));
        transformed.push(ordered);
    }

    let result = DataFrame::new(columns)?;
    if transformed.is_empty() {
        return Ok(result);
    }
    let keep: Vec<bool> = (0..order.len())
        .map(|row| {
            transformed.iter().any(|values| values[row].is_some())
                || skipped.iter().any(|present| present[row])
        })
        .collect();
    filter_rows(&result, &keep)
}

/// Daily values from cumulative ones: forward-fill, then first difference.
pub fn grouped_diff(
    data: &DataFrame,
    keys: &[&str],
    skip: &[&str],
    prefix: Option<(&str, &str)>,
) -> Result<DataFrame> {
    grouped_transform(data, keys, diff_values, skip, prefix)
}

/// Cumulative values from daily ones: nulls count as zero, then running sum.
pub fn grouped_cumsum(
    data: &DataFrame,
    keys: &[&str],
    skip: &[&str],
    prefix: Option<(&str, &str)>,
) -> Result<DataFrame> {
    grouped_transform(data, keys, cumsum_values, skip, prefix)
}

/// Derive the missing half of every `new_X`/`total_X` pair per key, ordered
/// by date. Row order and row count are unchanged.
pub fn infer_new_and_total(data: &DataFrame) -> Result<DataFrame> {
    let names = column_names(data);
    if !names.iter().any(|name| name == DATE_COLUMN) || !names.iter().any(|name| name == KEY_COLUMN)
    {
        return Ok(data.clone());
    }
    let key_cells = vec![
        cells_by_name(data, KEY_COLUMN)?,
        cells_by_name(data, DATE_COLUMN)?,
    ];
    let order = sorted_indices(&key_cells, data.height());
    let groups = group_runs(&order, &key_cells[..1]);

    let mut columns: Vec<Column> = data.get_columns().to_vec();
    for name in &names {
        let (target, transform) = if let Some(suffix) = name.strip_prefix("total_") {
            (format!("new_{suffix}"), diff_values as SeriesFn)
        } else if let Some(suffix) = name.strip_prefix("new_") {
            (format!("total_{suffix}"), cumsum_values as SeriesFn)
        } else {
            continue;
        };
        if names.contains(&target) {
            continue;
        }
        let column = data.column(name)?;
        let values: Vec<Option<f64>> = cells_of(column).iter().map(safe_float_cast).collect();
        let integral = integral_source(column, &values);
        let derived = transform_groups(&values, &groups, &transform);
        debug!(source = %name, target = %target, "inferred column");
        columns.push(numeric_column(&target, integral, derived));
    }
    Ok(DataFrame::new(columns)?)
}

/// Drop rows whose non-`keys` columns are all null.
pub fn drop_na_records<S: AsRef<str>>(data: &DataFrame, keys: &[S]) -> Result<DataFrame> {
    let value_columns: Vec<Vec<Cell>> = data
        .get_columns()
        .iter()
        .filter(|column| !keys.iter().any(|key| key.as_ref() == column.name().as_str()))
        .map(cells_of)
        .collect();
    if value_columns.is_empty() {
        return Ok(data.clone());
    }
    let keep: Vec<bool> = (0..data.height())
        .map(|row| value_columns.iter().any(|cells| !cells[row].is_null()))
        .collect();
    filter_rows(data, &keep)
}

/// Stable sort by `columns`: nulls first, numbers numerically, text
/// lexicographically. Columns missing from `data` are ignored.
pub fn sort_table<S: AsRef<str>>(data: &DataFrame, columns: &[S]) -> Result<DataFrame> {
    let sort_cells: Vec<Vec<Cell>> = columns
        .iter()
        .filter_map(|name| data.column(name.as_ref()).ok().map(cells_of))
        .collect();
    let order = sorted_indices(&sort_cells, data.height());
    take_rows(data, &order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_forward_fills_gaps() {
        let values = [Some(1.0), None, Some(4.0), Some(4.0)];
        assert_eq!(
            diff_values(&values),
            vec![None, Some(0.0), Some(3.0), Some(0.0)]
        );
    }

    #[test]
    fn cumsum_treats_null_as_zero() {
        let values = [Some(1.0), None, Some(2.0)];
        assert_eq!(
            cumsum_values(&values),
            vec![Some(1.0), Some(1.0), Some(3.0)]
        );
    }

    #[test]
    fn last_not_null_prefers_right_most() {
        let values = [Cell::Int(1), Cell::Int(2), Cell::Null];
        assert_eq!(agg_last_not_null(&values), Cell::Int(2));
        assert_eq!(agg_last_not_null(&[Cell::Null]), Cell::Null);
    }
}
