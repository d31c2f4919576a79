use crate::error::StorageError;
use crate::shortcode::ShortCode;
use crate::user::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The primary key.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The user who created the record.
    pub owner: UserId,
    /// Soft-delete marker. Deletion is terminal.
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates an active record.
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, owner: UserId) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
            owner,
            deleted: false,
        }
    }
}

/// A request to soft-delete one record, as buffered by the shortener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub short_code: ShortCode,
    pub owner: UserId,
    /// Enqueue time in microseconds since the Unix epoch.
    pub enqueued_at_micros: i64,
}

/// A read-only view of a repository.
///
/// This trait provides only the read operations from [`Repository`],
/// allowing services like the redirector to have read-only access.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record for a given short code.
    ///
    /// Fails with [`StorageError::NotFound`] if the code was never stored and
    /// with [`StorageError::Deleted`] if it has been soft-deleted.
    async fn get(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Liveness check of the backend.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a record keyed by its short code.
    ///
    /// With `overwrite == false` an existing code fails with
    /// [`StorageError::AlreadyExists`] and the stored value is left untouched.
    /// With `overwrite == true` an identical existing record is a no-op and a
    /// different one is updated in place.
    ///
    /// An original URL that is already active under another code fails with
    /// [`StorageError::Conflict`] carrying that code.
    async fn store(&self, record: UrlRecord, overwrite: bool) -> Result<()>;

    /// Inserts all records or none of them.
    ///
    /// Any uniqueness violation fails the batch with
    /// [`StorageError::AlreadyExists`].
    async fn store_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Returns the active records owned by `owner`.
    ///
    /// Fails with [`StorageError::NotFound`] when there are none.
    async fn list_user_urls(&self, owner: &UserId) -> Result<Vec<UrlRecord>>;

    /// Soft-deletes every `(short_code, owner)` pair in `requests` and returns
    /// how many records changed state.
    ///
    /// Pairs that do not match an active record owned by that user are
    /// skipped.
    async fn delete_user_urls(&self, requests: &[DeleteRequest]) -> Result<u64>;
}
