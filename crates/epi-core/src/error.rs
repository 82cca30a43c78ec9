use std::path::PathBuf;

use epi_ingest::IngestError;
use epi_model::ModelError;
use epi_transform::TransformError;
use epi_validate::ValidateError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised while running a single data source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to download {url}: {message}")]
    Network { url: String, message: String },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid options for source {source_name}: {message}")]
    InvalidOptions {
        source_name: String,
        message: String,
    },
    #[error("source {0} fetched no files")]
    NoInput(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that stop a whole chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to read chain config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse chain config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid schema entry {column}: {message}")]
    InvalidSchema { column: String, message: String },
    #[error("unknown source: {0}")]
    UnknownSource(String),
    #[error("pipeline chain does not exist: {0}")]
    UnknownChain(String),
    #[error("auxiliary table not configured: {0}")]
    MissingAuxiliary(String),
    #[error("metadata table has no {0} column")]
    MissingMetadataColumn(String),
    #[error("duplicate key in metadata table: {0}")]
    DuplicateKey(String),
    #[error("failed to read cache sitemap {path}: {message}")]
    CacheSitemap { path: PathBuf, message: String },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Validate(#[from] ValidateError),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, ChainError>;
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Render `error` followed by every distinct message of its source chain.
///
/// A source whose text is already part of the previous message is skipped,
/// so variants that embed their source in the display are not repeated.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut last = rendered.clone();
    let mut current = error.source();
    while let Some(source) = current {
        let message = source.to_string();
        if !last.contains(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        last = message;
        current = source.source();
    }
    rendered
}
