use crate::shortener::v1 as proto;
use portal_core as core;

impl From<proto::BatchItem> for core::BatchItem {
    fn from(item: proto::BatchItem) -> Self {
        Self {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        }
    }
}

impl From<core::BatchResult> for proto::BatchResult {
    fn from(result: core::BatchResult) -> Self {
        Self {
            correlation_id: result.correlation_id,
            short_url: result.short_url,
        }
    }
}

impl From<core::UserUrl> for proto::UserUrl {
    fn from(url: core::UserUrl) -> Self {
        Self {
            short_url: url.short_url,
            original_url: url.original_url,
        }
    }
}
