//! Generic source for CSV/TSV files that already resemble the schema.

use std::collections::BTreeMap;
use std::path::PathBuf;

use epi_ingest::{Cell, ReadOptions, cells_of, cells_to_column, read_table, string_column};
use epi_model::DATE_COLUMN;
use epi_transform::{
    concat_frames, date_offset, datetime_isoformat, filter_rows, pivot_table, rename_columns,
    safe_datetime_parse, select_columns,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auxiliary::AuxTables;
use crate::error::{SourceError, SourceResult};
use crate::source::{DataSource, SourceConfig};

/// Wide-to-long reshaping applied before renaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotOptions {
    /// Column holding the dates of the wide table.
    pub index: String,
    /// Name of the column receiving the former column names.
    pub name: String,
}

/// `parse` options understood by [`TableSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOptions {
    /// Field separator; inferred from the file extension when unset.
    pub separator: Option<char>,
    pub pivot: Option<PivotOptions>,
    /// Old column name to new column name.
    pub rename: BTreeMap<String, String>,
    /// Column holding dates after renaming. Defaults to `date`.
    pub date_column: Option<String>,
    /// `strftime` format of the date column. ISO-8601 when unset.
    pub date_format: Option<String>,
    /// Days added to every parsed date, for sources reporting with a lag.
    pub date_offset: Option<i64>,
    /// Columns added with the same value on every row.
    pub constants: BTreeMap<String, toml::Value>,
    /// Columns to keep, in order. Everything is kept when empty.
    pub columns: Vec<String>,
}

/// Reads every fetched file, stacks them and reshapes the result through
/// [`TableOptions`].
#[derive(Debug, Clone)]
pub struct TableSource {
    config: SourceConfig,
    options: TableOptions,
}

impl TableSource {
    pub const NAME: &'static str = "table";

    pub fn new(config: SourceConfig) -> SourceResult<Self> {
        let options: TableOptions = toml::Value::Table(config.parse.clone())
            .try_into()
            .map_err(|error: toml::de::Error| SourceError::InvalidOptions {
                source_name: config.name.clone(),
                message: error.to_string(),
            })?;
        if options.separator.is_some_and(|separator| !separator.is_ascii()) {
            return Err(SourceError::InvalidOptions {
                source_name: config.name.clone(),
                message: "separator must be an ASCII character".to_string(),
            });
        }
        Ok(Self { config, options })
    }

    pub fn factory(config: SourceConfig) -> SourceResult<Box<dyn DataSource>> {
        Ok(Box::new(Self::new(config)?))
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    fn read_options(&self) -> ReadOptions {
        let options = ReadOptions::default();
        match self.options.separator.and_then(|separator| u8::try_from(separator).ok()) {
            Some(separator) => options.with_separator(separator),
            None => options,
        }
    }

    fn normalize_dates(&self, data: &DataFrame) -> SourceResult<DataFrame> {
        let date_column = self.options.date_column.as_deref().unwrap_or(DATE_COLUMN);
        let column = data.column(date_column).map_err(|_| SourceError::InvalidOptions {
            source_name: self.config.name.clone(),
            message: format!("date column {date_column} not found"),
        })?;
        let format = self.options.date_format.as_deref();
        let dates: Vec<Option<String>> = cells_of(column)
            .iter()
            .map(|cell| {
                let text = cell.render()?;
                let date = match format {
                    Some(format) => datetime_isoformat(&text, format),
                    None => safe_datetime_parse(&text, None, false)
                        .map(|parsed| parsed.date().format("%Y-%m-%d").to_string()),
                }?;
                match self.options.date_offset {
                    Some(days) => date_offset(&date, days).ok(),
                    None => Some(date),
                }
            })
            .collect();

        let keep: Vec<bool> = dates.iter().map(Option::is_some).collect();
        let dropped = keep.iter().filter(|kept| !**kept).count();
        if dropped > 0 {
            warn!(source = %self.config.name, dropped, "rows with unparseable dates dropped");
        }

        let mut columns: Vec<_> = data
            .get_columns()
            .iter()
            .filter(|column| {
                let name = column.name().as_str();
                name != date_column && name != DATE_COLUMN
            })
            .cloned()
            .collect();
        columns.insert(0, string_column(DATE_COLUMN, dates));
        let normalized = DataFrame::new(columns)?;
        Ok(filter_rows(&normalized, &keep)?)
    }

    fn add_constants(&self, data: &DataFrame) -> SourceResult<DataFrame> {
        let mut data = data.clone();
        for (name, value) in &self.options.constants {
            let cell = constant_cell(value);
            let cells = vec![cell; data.height()];
            data.with_column(cells_to_column(name, &cells))?;
        }
        Ok(data)
    }
}

fn constant_cell(value: &toml::Value) -> Cell {
    match value {
        toml::Value::Integer(v) => Cell::Int(*v),
        toml::Value::Float(v) => Cell::Float(*v),
        toml::Value::String(v) => Cell::Text(v.clone()),
        other => Cell::Text(other.to_string()),
    }
}

impl DataSource for TableSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn parse(&self, sources: &[PathBuf], _aux: &AuxTables) -> SourceResult<DataFrame> {
        if sources.is_empty() {
            return Err(SourceError::NoInput(self.config.name.clone()));
        }
        let read_options = self.read_options();
        let frames = sources
            .iter()
            .map(|path| read_table(path, &read_options))
            .collect::<Result<Vec<_>, _>>()?;
        let mut data = concat_frames(&frames)?;
        debug!(files = frames.len(), rows = data.height(), "tables stacked");

        if let Some(pivot) = &self.options.pivot {
            data = pivot_table(&data, &pivot.index, &pivot.name)?;
        }
        if !self.options.rename.is_empty() {
            data = rename_columns(&data, &self.options.rename)?;
        }
        data = self.normalize_dates(&data)?;
        if !self.options.constants.is_empty() {
            data = self.add_constants(&data)?;
        }
        if !self.options.columns.is_empty() {
            data = select_columns(&data, self.options.columns.as_slice())?;
        }
        Ok(data)
    }
}
