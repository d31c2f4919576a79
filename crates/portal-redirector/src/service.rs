use std::sync::Arc;

use crate::redirector::Redirector;
use crate::RedirectorError;
use async_trait::async_trait;
use portal_core::{ReadRepository, ShortCode};
use tracing::{debug, trace};

/// Service for handling URL redirects.
///
/// Uses a read-only repository; no retries and no caching.
#[derive(Debug, Clone)]
pub struct RedirectorService<R> {
    repository: Arc<R>,
}

impl<R: ReadRepository> RedirectorService<R> {
    /// Creates a new RedirectorService with the given repository.
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }
}

#[async_trait]
impl<R: ReadRepository> Redirector for RedirectorService<R> {
    async fn resolve(&self, code: &str) -> crate::Result<String> {
        trace!(code = %code.escape_default(), "resolving short code");

        let code = ShortCode::new(code).map_err(|e| RedirectorError::InvalidPath(e.to_string()))?;

        match self.repository.get(&code).await {
            Ok(record) => {
                debug!(code = %code, url = %record.original_url, "Resolved short code");
                Ok(record.original_url)
            }
            Err(e) => {
                trace!(code = %code, error = %e, "Short code not resolved");
                Err(e.into())
            }
        }
    }
}
