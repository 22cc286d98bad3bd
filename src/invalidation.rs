use std::sync::Arc;

use tracing::info;

use crate::cloud::Cdn;
use crate::error::{PreviewError, Step};

/// Path pattern covering every object behind the distribution
pub const ALL_PATHS: &str = "/*";

pub struct CacheInvalidator {
    cdn: Arc<dyn Cdn>,
}

impl CacheInvalidator {
    pub fn new(cdn: Arc<dyn Cdn>) -> Self {
        Self { cdn }
    }

    /// Submit an invalidation of all paths and return its id.
    ///
    /// Completion is not awaited; freshly synced content may be served stale
    /// for a short while.
    pub async fn invalidate_all(&self, distribution_id: &str) -> Result<String, PreviewError> {
        info!("Creating CloudFront invalidation...");

        let caller_reference = format!("invalidation-{}", chrono::Utc::now().timestamp());
        let invalidation_id = self
            .cdn
            .create_invalidation(distribution_id, &[ALL_PATHS.to_string()], &caller_reference)
            .await
            .map_err(|e| PreviewError::mutation(Step::InvalidateCache, e))?;

        info!("✓ Invalidation created: {}", invalidation_id);
        Ok(invalidation_id)
    }
}
