//! CSV export of finished tables.

use std::fs;
use std::io::Write;
use std::path::Path;

use polars::prelude::DataFrame;

use crate::cell::{column_cells, column_names};
use crate::{IngestError, Result};

/// Write `df` as headed CSV. Nulls become empty fields and floats are
/// written without trailing zeros.
pub fn write_csv<W: Write>(df: &DataFrame, writer: W) -> Result<()> {
    let names = column_names(df);
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(column_cells(df, name)?);
    }

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&names)?;
    for idx in 0..df.height() {
        let row = columns
            .iter()
            .map(|cells| cells[idx].render().unwrap_or_default());
        writer.write_record(row)?;
    }
    writer
        .flush()
        .map_err(|source| IngestError::CsvWrite(source.into()))?;
    Ok(())
}

/// Write `df` to `path`, creating parent folders as needed.
pub fn write_csv_table(df: &DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| IngestError::io(parent, source))?;
    }
    let file = fs::File::create(path).map_err(|source| IngestError::io(path, source))?;
    write_csv(df, file)
}
