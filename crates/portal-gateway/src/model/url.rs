use portal_core::{BatchItem, BatchResult, UserUrl};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

/// `result` holds the new short URL, or the existing one on conflict.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequestItem {
    pub correlation_id: String,
    pub original_url: String,
}

impl From<BatchRequestItem> for BatchItem {
    fn from(item: BatchRequestItem) -> Self {
        Self {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

impl From<BatchResult> for BatchResponseItem {
    fn from(result: BatchResult) -> Self {
        Self {
            correlation_id: result.correlation_id,
            short_url: result.short_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponse {
    pub short_url: String,
    pub original_url: String,
}

impl From<UserUrl> for UserUrlResponse {
    fn from(url: UserUrl) -> Self {
        Self {
            short_url: url.short_url,
            original_url: url.original_url,
        }
    }
}
