use epi_ingest::IngestError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("last grouping key must be \"date\", got {0:?}")]
    DateKeyNotLast(Option<String>),
    #[error("column not found: {0}")]
    MissingColumn(String),
    #[error("invalid ISO date: {0:?}")]
    InvalidDate(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
