use std::sync::Arc;

use sqlx::PgPool;

use crate::storage::PhotoStorage;
use crate::vision_client::UpstreamModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: PhotoStorage,
    /// Pluggable upstream model. Production: VisionClient against Anthropic.
    pub upstream: Arc<dyn UpstreamModel>,
}
