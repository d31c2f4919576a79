use portal_core::StorageError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RedirectorError {
    #[error("invalid short code path: {0}")]
    InvalidPath(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Deleted(String),
    #[error("storage operation failed: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for RedirectorError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(code) => RedirectorError::NotFound(code),
            StorageError::Deleted(code) => RedirectorError::Deleted(code),
            other => RedirectorError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RedirectorError>;
