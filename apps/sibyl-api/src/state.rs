use std::sync::Arc;

use sibyl_service::{AnswerService, Collaborators, FixedWindowLimiter};
use sibyl_storage::QdrantStore;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AnswerService>,
}
impl AppState {
    pub fn new(config: sibyl_config::Config) -> color_eyre::Result<Self> {
        let store = QdrantStore::new(&config.storage.qdrant)?;
        let limiter = Arc::new(FixedWindowLimiter::new(&config.rate_limit));
        let collaborators = Collaborators::live(store, limiter);
        let service = AnswerService::new(config, collaborators);

        Ok(Self { service: Arc::new(service) })
    }

    /// Test seam: wraps a service whose collaborators are already wired.
    pub fn with_service(service: AnswerService) -> Self {
        Self { service: Arc::new(service) }
    }
}
