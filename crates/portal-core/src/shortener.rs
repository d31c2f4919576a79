use crate::error::ShortenerError;
use crate::user::User;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, ShortenerError>;

/// One entry of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Caller-chosen identifier echoed back in the matching [`BatchResult`].
    pub correlation_id: String,
    /// The original URL to be shortened.
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// A record owned by a user, with its code rewritten into the served URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub short_url: String,
    pub original_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `user` and returns the served short URL.
    async fn shorten(&self, user: &User, original_url: &str) -> Result<String>;

    /// Shortens every item in one all-or-nothing storage write.
    async fn shorten_batch(&self, user: &User, items: Vec<BatchItem>) -> Result<Vec<BatchResult>>;

    /// Schedules the given codes for asynchronous deletion.
    ///
    /// Returns once the requests are accepted; the storage write happens later.
    async fn delete_batch(&self, user: &User, codes: Vec<String>) -> Result<()>;

    /// Lists the active URLs owned by `user`.
    async fn list_user_urls(&self, user: &User) -> Result<Vec<UserUrl>>;
}
