//! Auxiliary tables shared read-only by every source of a chain.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use epi_ingest::{ReadOptions, read_table};
use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::error::{ChainError, Result};
use crate::merge::{MetadataIndex, with_fuzzy_columns};

/// Name of the mandatory auxiliary table.
pub const METADATA_TABLE: &str = "metadata";

/// Default location of the metadata table, relative to the project root.
pub const DEFAULT_METADATA_PATH: &str = "data/metadata.csv";

/// Loaded auxiliary tables. Every source gets its own clone.
#[derive(Debug, Clone)]
pub struct AuxTables {
    metadata: MetadataIndex,
    tables: BTreeMap<String, DataFrame>,
}

impl AuxTables {
    /// Read every table in `paths`. The `metadata` entry is required and
    /// gains `<column>_fuzzy` columns.
    pub fn load(paths: &BTreeMap<String, PathBuf>) -> Result<Self> {
        if !paths.contains_key(METADATA_TABLE) {
            return Err(ChainError::MissingAuxiliary(METADATA_TABLE.to_string()));
        }
        let options = ReadOptions::default();
        let mut tables = BTreeMap::new();
        for (name, path) in paths {
            let table = read_table(path, &options)?;
            debug!(table = %name, path = %path.display(), rows = table.height(), "auxiliary table loaded");
            tables.insert(name.clone(), table);
        }
        let aux = Self::from_tables(tables)?;
        info!(tables = aux.tables.len(), keys = aux.metadata.len(), "auxiliary tables ready");
        Ok(aux)
    }

    /// Wrap an in-memory metadata frame.
    pub fn from_metadata(metadata: &DataFrame) -> Result<Self> {
        Self::from_tables(BTreeMap::from([(METADATA_TABLE.to_string(), metadata.clone())]))
    }

    fn from_tables(mut tables: BTreeMap<String, DataFrame>) -> Result<Self> {
        let metadata = tables
            .remove(METADATA_TABLE)
            .ok_or_else(|| ChainError::MissingAuxiliary(METADATA_TABLE.to_string()))?;
        let metadata = with_fuzzy_columns(&metadata)?;
        let index = MetadataIndex::from_frame(&metadata)?;
        tables.insert(METADATA_TABLE.to_string(), metadata);
        Ok(Self {
            metadata: index,
            tables,
        })
    }

    pub fn metadata(&self) -> &MetadataIndex {
        &self.metadata
    }

    /// A loaded table by name, `metadata` included.
    pub fn table(&self, name: &str) -> Option<&DataFrame> {
        self.tables.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Add or replace a non-metadata table.
    pub fn insert(&mut self, name: impl Into<String>, table: DataFrame) {
        let name = name.into();
        if name != METADATA_TABLE {
            self.tables.insert(name, table);
        }
    }
}

/// Resolve configured auxiliary paths against `root`, adding the default
/// metadata entry when absent.
pub fn resolve_aux_paths(root: &Path, configured: &BTreeMap<String, PathBuf>) -> BTreeMap<String, PathBuf> {
    let mut paths: BTreeMap<String, PathBuf> = configured
        .iter()
        .map(|(name, path)| (name.clone(), root.join(path)))
        .collect();
    paths
        .entry(METADATA_TABLE.to_string())
        .or_insert_with(|| root.join(DEFAULT_METADATA_PATH));
    paths
}
