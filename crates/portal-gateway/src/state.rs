use std::sync::Arc;

use portal_core::{ReadRepository, Shortener};
use portal_redirector::Redirector;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<dyn Shortener>,
    pub redirector: Arc<dyn Redirector>,
    /// Used only for liveness checks.
    pub storage: Arc<dyn ReadRepository>,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        redirector: Arc<dyn Redirector>,
        storage: Arc<dyn ReadRepository>,
    ) -> Self {
        Self {
            shortener,
            redirector,
            storage,
        }
    }
}
