//! The data source contract.
//!
//! A source turns one upstream dataset into rows of the chain's schema by
//! running five stages in a fixed order: fetch, parse, merge, filter and
//! patch. Only `parse` is source specific; the other stages have default
//! implementations driven by [`SourceConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use epi_ingest::{Cell, ReadOptions, cells_of, column_names, read_table, string_column};
use epi_model::{
    Criterion, DATE_COLUMN, KEY_COLUMN, KeyResolution, LocationField, MATCH_STRING_COLUMN,
    MergeRecord,
};
use epi_transform::{TransformError, filter_rows, infer_new_and_total, typed_column};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::auxiliary::AuxTables;
use crate::error::SourceResult;
use crate::fetch::{FetchContext, FetchSpec, fetch_all};

/// Options of the merge stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Resolve every row on its own instead of once per distinct record.
    pub serial: bool,
}

/// Declarative row filter applied after merging.
///
/// Dates are ISO strings and compare lexicographically. Rows without a
/// date or key are never dropped by the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_min: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_max: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_dates: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_keys: Vec<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.date_min.is_none()
            && self.date_max.is_none()
            && self.exclude_dates.is_empty()
            && self.exclude_keys.is_empty()
    }

    fn keeps(&self, date: Option<&str>, key: Option<&str>) -> bool {
        if let Some(date) = date {
            if self.date_min.as_deref().is_some_and(|min| date < min)
                || self.date_max.as_deref().is_some_and(|max| date > max)
                || self.exclude_dates.iter().any(|excluded| excluded == date)
            {
                return false;
            }
        }
        !key.is_some_and(|key| self.exclude_keys.iter().any(|excluded| excluded == key))
    }

    /// Keep the rows of `data` this filter accepts.
    pub fn apply(&self, data: &DataFrame) -> SourceResult<DataFrame> {
        if self.is_empty() {
            return Ok(data.clone());
        }
        let rendered = |name: &str| -> Vec<Option<String>> {
            match data.column(name) {
                Ok(column) => cells_of(column).iter().map(Cell::render).collect(),
                Err(_) => vec![None; data.height()],
            }
        };
        let dates = rendered(DATE_COLUMN);
        let keys = rendered(KEY_COLUMN);
        let keep: Vec<bool> = dates
            .iter()
            .zip(&keys)
            .map(|(date, key)| self.keeps(date.as_deref(), key.as_deref()))
            .collect();
        Ok(filter_rows(data, &keep)?)
    }
}

/// Configuration of one source instance. Owned by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Registry name of the source implementation.
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fetch: Vec<FetchSpec>,
    /// Source specific parse options.
    #[serde(default)]
    pub parse: toml::Table,
    #[serde(default)]
    pub merge: MergeOptions,
    #[serde(default)]
    pub filter: FilterSpec,
    /// CSV of `(date, key)` rows whose non-null cells overwrite the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<PathBuf>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fetch: Vec::new(),
            parse: toml::Table::new(),
            merge: MergeOptions::default(),
            filter: FilterSpec::default(),
            patch: None,
        }
    }

    /// Stable identity of this configuration, used to name intermediate
    /// outputs.
    pub fn fingerprint(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_default();
        format!("{}.{body}", self.name)
    }
}

/// A pipeline data source.
///
/// Implementors provide [`DataSource::parse`]; every other stage has a
/// default that most sources keep.
pub trait DataSource: Send + Sync {
    fn config(&self) -> &SourceConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Download the configured resources and return their local paths.
    fn fetch(&self, ctx: &FetchContext) -> SourceResult<Vec<PathBuf>> {
        fetch_all(ctx, &self.config().fetch)
    }

    /// Turn fetched files into a table with schema column names.
    fn parse(&self, sources: &[PathBuf], aux: &AuxTables) -> SourceResult<DataFrame>;

    /// Resolve one record to a metadata key.
    fn merge(&self, record: &MergeRecord, aux: &AuxTables) -> KeyResolution {
        aux.metadata().resolve_key(record)
    }

    fn filter(&self, data: DataFrame) -> SourceResult<DataFrame> {
        self.config().filter.apply(&data)
    }

    fn patch(&self, data: DataFrame) -> SourceResult<DataFrame> {
        match &self.config().patch {
            Some(path) => apply_patch_file(&data, path),
            None => Ok(data),
        }
    }

    /// Run every stage in order.
    fn run(&self, ctx: &FetchContext, aux: &AuxTables) -> SourceResult<DataFrame> {
        run_source(self, ctx, aux)
    }
}

/// The default stage sequence of [`DataSource::run`].
pub fn run_source<S>(source: &S, ctx: &FetchContext, aux: &AuxTables) -> SourceResult<DataFrame>
where
    S: DataSource + ?Sized,
{
    let span = info_span!("source", name = source.name());
    let _guard = span.enter();

    let files = source.fetch(ctx)?;
    debug!(files = files.len(), "fetched");
    let data = source.parse(&files, aux)?;
    debug!(rows = data.height(), columns = data.width(), "parsed");
    let data = merge_keys(source, &data, aux)?;
    let data = source.filter(data)?;
    let data = source.patch(data)?;
    let data = infer_new_and_total(&data)?;
    info!(rows = data.height(), "source finished");
    Ok(data)
}

/// Columns of `data` that feed a [`MergeRecord`].
struct MergeColumns {
    key: Option<Vec<Option<String>>>,
    fields: Vec<(LocationField, Vec<Option<String>>)>,
    match_string: Option<Vec<Option<String>>>,
}

impl MergeColumns {
    fn collect(data: &DataFrame) -> Self {
        let rendered = |name: &str| {
            data.column(name)
                .ok()
                .map(|column| cells_of(column).iter().map(Cell::render).collect::<Vec<_>>())
        };
        let fields = LocationField::ALL
            .iter()
            .filter_map(|field| rendered(field.column_name()).map(|values| (*field, values)))
            .collect();
        Self {
            key: rendered(KEY_COLUMN),
            fields,
            match_string: rendered(MATCH_STRING_COLUMN),
        }
    }

    fn record(&self, row: usize) -> MergeRecord {
        let mut record = MergeRecord::new();
        if let Some(key) = self.key.as_ref().and_then(|keys| keys[row].clone()) {
            record = record.with_key(key);
        }
        for (field, values) in &self.fields {
            record.set(*field, Criterion::from_cell(values[row].as_deref()));
        }
        if let Some(value) = self.match_string.as_ref().and_then(|values| values[row].clone()) {
            record = record.with_match_string(value);
        }
        record
    }
}

/// Set the `key` column of `data` through [`DataSource::merge`] and drop
/// the rows that do not resolve.
///
/// Each distinct record is resolved once unless the source asks for
/// serial merging.
pub fn merge_keys<S>(source: &S, data: &DataFrame, aux: &AuxTables) -> SourceResult<DataFrame>
where
    S: DataSource + ?Sized,
{
    let columns = MergeColumns::collect(data);
    let serial = source.config().merge.serial;
    let mut resolved: HashMap<MergeRecord, Option<String>> = HashMap::new();
    let mut keys: Vec<Option<String>> = Vec::with_capacity(data.height());
    for row in 0..data.height() {
        let record = columns.record(row);
        let key = if serial {
            source.merge(&record, aux).into_key()
        } else if let Some(key) = resolved.get(&record) {
            key.clone()
        } else {
            let key = source.merge(&record, aux).into_key();
            resolved.insert(record, key.clone());
            key
        };
        keys.push(key);
    }

    let keep: Vec<bool> = keys.iter().map(Option::is_some).collect();
    let dropped = keep.iter().filter(|kept| !**kept).count();
    if dropped > 0 {
        warn!(dropped, "records without a resolved key dropped");
    }
    if !serial {
        debug!(distinct = resolved.len(), rows = data.height(), "records merged");
    }

    let mut merged = data.clone();
    merged.with_column(string_column(KEY_COLUMN, keys))?;
    Ok(filter_rows(&merged, &keep)?)
}

fn apply_patch_file(data: &DataFrame, path: &Path) -> SourceResult<DataFrame> {
    let patch = read_table(path, &ReadOptions::default())?;
    debug!(path = %path.display(), rows = patch.height(), "applying patch");
    patch_table(data, &patch)
}

fn row_ids(df: &DataFrame) -> SourceResult<Vec<Option<(String, String)>>> {
    let column = |name: &str| {
        df.column(name)
            .map(cells_of)
            .map_err(|_| TransformError::MissingColumn(name.to_string()))
    };
    let dates = column(DATE_COLUMN)?;
    let keys = column(KEY_COLUMN)?;
    Ok(dates
        .iter()
        .zip(&keys)
        .map(|(date, key)| Some((date.render()?, key.render()?)))
        .collect())
}

/// Overwrite cells of `data` with the non-null cells of `patch` on rows
/// sharing the same `(date, key)`. Patch columns absent from `data` and
/// patch rows without a matching row are ignored.
pub fn patch_table(data: &DataFrame, patch: &DataFrame) -> SourceResult<DataFrame> {
    if patch.height() == 0 {
        return Ok(data.clone());
    }
    let data_ids = row_ids(data)?;
    let mut patch_rows: HashMap<(String, String), usize> = HashMap::new();
    for (idx, id) in row_ids(patch)?.into_iter().enumerate() {
        if let Some(id) = id {
            patch_rows.insert(id, idx);
        }
    }
    let targets: Vec<Option<usize>> = data_ids
        .iter()
        .map(|id| id.as_ref().and_then(|id| patch_rows.get(id).copied()))
        .collect();

    let patch_names = column_names(patch);
    let mut patched = 0usize;
    let mut columns = Vec::with_capacity(data.width());
    for column in data.get_columns() {
        let name = column.name().as_str();
        let patchable = name != DATE_COLUMN
            && name != KEY_COLUMN
            && patch_names.iter().any(|patch_name| patch_name == name);
        if !patchable {
            columns.push(column.clone());
            continue;
        }
        let replacements = cells_of(patch.column(name)?);
        let mut cells = cells_of(column);
        for (cell, target) in cells.iter_mut().zip(&targets) {
            if let Some(replacement) = target.map(|idx| &replacements[idx])
                && !replacement.is_null()
            {
                *cell = replacement.clone();
                patched += 1;
            }
        }
        columns.push(typed_column(name, column.dtype(), &cells));
    }
    debug!(cells = patched, "patched");
    Ok(DataFrame::new(columns)?)
}
