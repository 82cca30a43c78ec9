use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("anomaly detected in {scope}: {message}")]
    Anomaly { scope: String, message: String },
    #[error(transparent)]
    Transform(#[from] epi_transform::TransformError),
    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),
}

pub type Result<T> = std::result::Result<T, ValidateError>;
