use crate::shortcode::ShortCode;
use thiserror::Error;

/// Errors raised while building core domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid user id: {0}")]
    InvalidUserId(String),
}

/// Errors returned by the storage contract.
///
/// `NotFound`, `Deleted`, `AlreadyExists` and `Conflict` are the kinds callers
/// branch on. Everything else is an opaque backend failure.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Deleted(String),
    #[error("short code already exists: {0}")]
    AlreadyExists(String),
    #[error("original url is already shortened as {existing}")]
    Conflict { existing: ShortCode },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Errors returned by the shortening service.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("url is already shortened as {short_url}")]
    Conflict { short_url: String },
    #[error("gave up generating a unique short code after {attempts} attempts")]
    GiveUp { attempts: usize },
    #[error("user is not authenticated")]
    Unauthorized,
    #[error("batch is empty")]
    EmptyBatch,
    #[error("deletion buffer is closed")]
    Closed,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
            CoreError::InvalidUserId(message) => Self::Storage(StorageError::InvalidData(message)),
        }
    }
}
