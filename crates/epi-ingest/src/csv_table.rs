use std::path::Path;

use csv::ReaderBuilder;
use polars::prelude::DataFrame;
use tracing::debug;

use crate::cell::string_column;
use crate::{IngestError, Result};

/// Cell values read as null.
pub const DEFAULT_NULL_VALUES: &[&str] = &["", "N/A"];

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub separator: u8,
    pub null_values: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            null_values: DEFAULT_NULL_VALUES.iter().map(|v| (*v).to_string()).collect(),
        }
    }
}

impl ReadOptions {
    #[must_use]
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Read a headed CSV file into a frame of nullable String columns.
///
/// Values listed in [`ReadOptions::null_values`] become nulls; short rows
/// are padded with nulls.
pub fn read_csv_frame(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(options.separator)
        .from_path(path)
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(normalize_header)
        .collect();

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }
        for (idx, column) in values.iter_mut().enumerate() {
            let value = record.get(idx).map(normalize_cell);
            let value = value.filter(|v| !options.null_values.iter().any(|null| null == v));
            column.push(value);
        }
    }

    let row_count = values.first().map_or(0, Vec::len);
    debug!(path = %path.display(), rows = row_count, columns = headers.len(), "read csv");
    let columns = headers
        .iter()
        .zip(values)
        .map(|(name, column)| string_column(name, column))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Read a tabular file, dispatching on its extension.
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    if !path.exists() {
        return Err(IngestError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        ));
    }
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => read_csv_frame(path, options),
        Some("tsv") => read_csv_frame(path, &options.clone().with_separator(b'\t')),
        _ => Err(IngestError::UnsupportedExtension {
            path: path.to_path_buf(),
        }),
    }
}
