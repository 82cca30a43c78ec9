//! Chain configuration files.
//!
//! A chain lives in `<pipelines>/<name>/config.toml`. Auxiliary paths are
//! relative to the project root, the parent of the pipelines folder; patch
//! paths are relative to the chain's own folder.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use epi_model::{ColumnType, DATE_COLUMN, KEY_COLUMN, Schema};
use serde::Deserialize;
use tracing::debug;

use crate::auxiliary::resolve_aux_paths;
use crate::error::{ChainError, Result};
use crate::source::SourceConfig;

/// File name of a chain configuration inside its folder.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChainConfig {
    schema: toml::Table,
    #[serde(default)]
    auxiliary: BTreeMap<String, PathBuf>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// A parsed chain configuration with every path resolved.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub schema: Schema,
    /// Auxiliary table paths, `metadata` always included.
    pub auxiliary: BTreeMap<String, PathBuf>,
    pub sources: Vec<SourceConfig>,
}

impl ChainConfig {
    /// Load `<pipelines_dir>/<name>/config.toml`.
    pub fn load(pipelines_dir: &Path, name: &str) -> Result<Self> {
        let chain_dir = pipelines_dir.join(name);
        let path = chain_dir.join(CONFIG_FILE);
        let text = fs::read_to_string(&path).map_err(|source| ChainError::ReadConfig {
            path: path.clone(),
            source,
        })?;
        let root = pipelines_dir
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let config = Self::from_toml_str(name, &text, &root, &chain_dir)?;
        debug!(chain = name, path = %path.display(), sources = config.sources.len(), "chain config loaded");
        Ok(config)
    }

    /// Parse a configuration from text. `root` anchors auxiliary paths and
    /// `chain_dir` anchors patch paths.
    pub fn from_toml_str(name: &str, text: &str, root: &Path, chain_dir: &Path) -> Result<Self> {
        let raw: RawChainConfig = toml::from_str(text).map_err(|source| ChainError::ParseConfig {
            path: chain_dir.join(CONFIG_FILE),
            source,
        })?;
        let schema = parse_schema(&raw.schema)?;
        let sources = raw
            .sources
            .into_iter()
            .map(|mut source| {
                source.patch = source.patch.map(|patch| chain_dir.join(patch));
                source
            })
            .collect();
        Ok(Self {
            name: name.to_string(),
            schema,
            auxiliary: resolve_aux_paths(root, &raw.auxiliary),
            sources,
        })
    }
}

fn parse_schema(table: &toml::Table) -> Result<Schema> {
    let mut schema = Schema::new();
    for (column, value) in table {
        let invalid = |message: String| ChainError::InvalidSchema {
            column: column.clone(),
            message,
        };
        let dtype_name = value
            .as_str()
            .ok_or_else(|| invalid(format!("expected a dtype name, found {value}")))?;
        let dtype = ColumnType::parse(dtype_name).map_err(|error| invalid(error.to_string()))?;
        schema
            .push(column.clone(), dtype)
            .map_err(|error| invalid(error.to_string()))?;
    }
    for required in [DATE_COLUMN, KEY_COLUMN] {
        if !schema.contains(required) {
            return Err(ChainError::InvalidSchema {
                column: required.to_string(),
                message: "required column is not declared".to_string(),
            });
        }
    }
    Ok(schema)
}

/// Names of the chains under `pipelines_dir`, sorted. Folders starting
/// with `_` are ignored.
pub fn list_chains(pipelines_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(pipelines_dir).map_err(|source| ChainError::Io {
        path: pipelines_dir.to_path_buf(),
        source,
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ChainError::Io {
            path: pipelines_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.join(CONFIG_FILE).is_file()
            && let Some(name) = path.file_name().and_then(|name| name.to_str())
            && !name.starts_with('_')
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Name of the exported table of a chain: underscores become dashes.
pub fn table_name(chain: &str) -> String {
    chain.replace('_', "-")
}

/// Pick the chains to run. `only` and `exclude` accept chain or table
/// names; every name must exist. An empty `only` selects everything.
pub fn select_chains(all: &[String], only: &[String], exclude: &[String]) -> Result<Vec<String>> {
    let known = |name: &String| all.iter().any(|chain| chain == name || table_name(chain) == *name);
    if let Some(unknown) = only.iter().chain(exclude).find(|name| !known(*name)) {
        return Err(ChainError::UnknownChain(unknown.clone()));
    }
    let listed = |names: &[String], chain: &str| {
        names
            .iter()
            .any(|name| name == chain || *name == table_name(chain))
    };
    Ok(all
        .iter()
        .filter(|chain| only.is_empty() || listed(only, chain.as_str()))
        .filter(|chain| !listed(exclude, chain.as_str()))
        .cloned()
        .collect())
}
