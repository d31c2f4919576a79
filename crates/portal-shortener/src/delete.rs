use async_trait::async_trait;
use portal_buffer::BatchSink;
use portal_core::{DeleteRequest, Repository};
use tracing::{error, info};

/// Applies buffered deletions to the repository.
///
/// Storage failures are logged and the batch is dropped. Callers of
/// `delete_batch` already got their acknowledgement and never hear about it.
#[derive(Debug, Clone)]
pub struct DeleteSink<R> {
    repository: R,
}

impl<R: Repository> DeleteSink<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: Repository> BatchSink<DeleteRequest> for DeleteSink<R> {
    async fn flush(&self, batch: Vec<DeleteRequest>) {
        let requested = batch.len();

        match self.repository.delete_user_urls(&batch).await {
            Ok(deleted) => info!(requested, deleted, "Applied URL deletions"),
            Err(e) => error!(requested, error = %e, "Failed to apply URL deletions"),
        }
    }
}
