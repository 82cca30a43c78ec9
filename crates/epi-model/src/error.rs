use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unsupported dtype: {0:?}")]
    UnsupportedDtype(String),
    #[error("duplicate schema column: {0}")]
    DuplicateColumn(String),
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
