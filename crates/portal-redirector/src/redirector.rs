use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a raw short code, as taken from a request path, to the
    /// original URL.
    async fn resolve(&self, code: &str) -> Result<String>;
}
