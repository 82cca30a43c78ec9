//! Key resolution against the metadata table.
//!
//! A record that does not carry a usable `key` is resolved through a fixed
//! cascade of rules, from exact structural matches to fuzzy text and
//! finally regular expressions. A rule only wins when it leaves exactly one
//! candidate: more than one is treated as a failure, never a guess.

use std::collections::HashSet;

use epi_ingest::{Cell, cells_of, column_names, string_column};
use epi_model::{
    KEY_COLUMN, KeyLevel, KeyResolution, LocationField, MATCH_REGEX_COLUMN,
    MATCH_STRING_COLUMN, MergeRecord, key_level, parent_key,
};
use epi_transform::fuzzy_text;
use polars::prelude::DataFrame;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::{ChainError, Result};

/// Suffix of the precomputed normalized columns.
pub const FUZZY_SUFFIX: &str = "_fuzzy";

#[derive(Debug, Clone)]
struct MetadataRow {
    key: String,
    fields: [Option<String>; 6],
    fuzzy: [Option<String>; 6],
    match_regex: Option<String>,
    match_regex_fuzzy: Option<String>,
    regex: Option<Regex>,
}

impl MetadataRow {
    fn field(&self, field: LocationField) -> Option<&str> {
        self.fields[field.index()].as_deref()
    }

    fn fuzzy(&self, field: LocationField) -> Option<&str> {
        self.fuzzy[field.index()].as_deref()
    }
}

fn optional_column(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    match df.column(name) {
        Ok(column) => cells_of(column).iter().map(Cell::render).collect(),
        Err(_) => vec![None; df.height()],
    }
}

/// Case-insensitive pattern anchored at the start of the input.
fn compile_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
}

/// Metadata rows prepared for key resolution: normalized columns are
/// computed and `match_regex` patterns compiled once.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    rows: Vec<MetadataRow>,
    keys: HashSet<String>,
}

impl MetadataIndex {
    /// Build the index from a metadata frame.
    ///
    /// The frame needs a `key` column; every other metadata column is
    /// optional and treated as null when absent. Duplicate keys are
    /// rejected. Level-2 keys whose level-1 parent is missing only produce a
    /// warning.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let key_column = df
            .column(KEY_COLUMN)
            .map_err(|_| ChainError::MissingMetadataColumn(KEY_COLUMN.to_string()))?;
        let keys_in_order = cells_of(key_column);
        let field_values: Vec<Vec<Option<String>>> = LocationField::ALL
            .iter()
            .map(|field| optional_column(df, field.column_name()))
            .collect();
        let regexes = optional_column(df, MATCH_REGEX_COLUMN);

        let mut rows = Vec::with_capacity(df.height());
        let mut keys = HashSet::with_capacity(df.height());
        for (idx, key) in keys_in_order.iter().enumerate() {
            let Some(key) = key.render() else {
                warn!(row = idx, "metadata row without key skipped");
                continue;
            };
            if !keys.insert(key.clone()) {
                return Err(ChainError::DuplicateKey(key));
            }
            let fields: [Option<String>; 6] =
                std::array::from_fn(|pos| field_values[pos][idx].clone());
            let fuzzy: [Option<String>; 6] =
                std::array::from_fn(|pos| fields[pos].as_deref().map(fuzzy_text));
            let match_regex = regexes[idx].clone();
            let regex = match match_regex.as_deref() {
                Some(pattern) => match compile_pattern(pattern) {
                    Ok(regex) => Some(regex),
                    Err(error) => {
                        warn!(%key, pattern, %error, "invalid match_regex skipped");
                        None
                    }
                },
                None => None,
            };
            rows.push(MetadataRow {
                key,
                fields,
                fuzzy,
                match_regex_fuzzy: match_regex.as_deref().map(fuzzy_text),
                match_regex,
                regex,
            });
        }

        let index = Self { rows, keys };
        for orphan in index.orphans() {
            warn!(key = %orphan, "metadata key has no parent entry");
        }
        debug!(rows = index.rows.len(), "metadata index built");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Level-2 keys whose level-1 parent is not in the table.
    pub fn orphans(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.key.as_str())
            .filter(|key| matches!(key_level(key), Ok(KeyLevel::Subregion2)))
            .filter(|key| parent_key(key).is_some_and(|parent| !self.keys.contains(parent)))
            .collect()
    }

    /// Resolve `record` to a metadata key.
    pub fn resolve_key(&self, record: &MergeRecord) -> KeyResolution {
        if let Some(key) = record.key.as_deref() {
            if self.keys.contains(key) {
                return KeyResolution::Resolved(key.to_string());
            }
            warn!(%record, "key provided but not found in metadata");
            return KeyResolution::UnknownKey(key.to_string());
        }

        let candidates: Vec<&MetadataRow> = self
            .rows
            .iter()
            .filter(|row| {
                record
                    .criteria()
                    .filter(|(_, criterion)| criterion.is_restrictive())
                    .all(|(field, criterion)| row.field(field) == criterion.value())
            })
            .collect();
        if let [row] = candidates.as_slice() {
            return KeyResolution::Resolved(row.key.clone());
        }

        if let Some(raw) = record.match_string.as_deref()
            && let Some(key) = match_text(&candidates, raw)
        {
            return KeyResolution::Resolved(key);
        }

        let resolution = if candidates.is_empty() {
            KeyResolution::NoCandidate
        } else {
            KeyResolution::Ambiguous(candidates.len())
        };
        warn!(%record, ?resolution, "no key match found");
        resolution
    }
}

/// The key of the only candidate satisfying `predicate`.
fn single_match<'a, P>(candidates: &[&'a MetadataRow], predicate: P) -> Option<&'a str>
where
    P: Fn(&MetadataRow) -> bool,
{
    let mut matches = candidates.iter().copied().filter(|row| predicate(*row));
    match (matches.next(), matches.next()) {
        (Some(row), None) => Some(row.key.as_str()),
        _ => None,
    }
}

/// Fuzzy and regex rules over the hierarchically filtered candidates.
fn match_text(candidates: &[&MetadataRow], raw: &str) -> Option<String> {
    let fuzzy = fuzzy_text(raw);

    for field in LocationField::SUBREGIONS {
        if let Some(key) = single_match(candidates, |row| row.fuzzy(field) == Some(fuzzy.as_str())) {
            return Some(key.to_string());
        }
    }

    if let Some(key) = single_match(candidates, |row| {
        row.match_regex_fuzzy.as_deref() == Some(fuzzy.as_str())
    }) {
        return Some(key.to_string());
    }
    if let Some(key) = single_match(candidates, |row| row.match_regex.as_deref() == Some(raw)) {
        return Some(key.to_string());
    }

    for search in [fuzzy.as_str(), raw] {
        if let Some(key) = single_match(candidates, |row| {
            row.regex.as_ref().is_some_and(|regex| regex.is_match(search))
        }) {
            return Some(key.to_string());
        }
    }
    None
}

/// Append a `<column>_fuzzy` column for every location column and for
/// `match_string`/`match_regex` present in `df`.
pub fn with_fuzzy_columns(df: &DataFrame) -> Result<DataFrame> {
    let present = column_names(df);
    let mut columns = df.get_columns().to_vec();
    let sources = LocationField::ALL
        .iter()
        .map(|field| field.column_name())
        .chain([MATCH_STRING_COLUMN, MATCH_REGEX_COLUMN]);
    for name in sources {
        if !present.iter().any(|column| column == name) {
            continue;
        }
        let values = optional_column(df, name)
            .into_iter()
            .map(|value| value.map(|text| fuzzy_text(&text)))
            .collect();
        columns.push(string_column(&format!("{name}{FUZZY_SUFFIX}"), values));
    }
    Ok(DataFrame::new(columns)?)
}
