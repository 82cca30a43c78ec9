//! Registry of source implementations.
//!
//! Chain configs name their sources; the registry maps each name to a
//! factory building the source from its config.

use std::collections::BTreeMap;

use crate::error::{ChainError, Result, SourceResult};
use crate::source::{DataSource, SourceConfig};
use crate::sources::TableSource;

/// Builds a source from its configuration.
pub type SourceFactory = fn(SourceConfig) -> SourceResult<Box<dyn DataSource>>;

pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(TableSource::NAME, TableSource::factory);
        registry
    }
}

impl SourceRegistry {
    /// Registry without any source.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: SourceFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the source named by `config.name`.
    pub fn build(&self, config: SourceConfig) -> Result<Box<dyn DataSource>> {
        let factory = self
            .factories
            .get(&config.name)
            .ok_or_else(|| ChainError::UnknownSource(config.name.clone()))?;
        Ok(factory(config)?)
    }
}
