use std::sync::Arc;

use tracing::{debug, info};

use crate::cloud::ObjectStorage;
use crate::error::{PreviewError, Step};

/// Largest batch a single multi-object delete accepts
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Creates and removes the per-environment bucket
pub struct BucketManager {
    storage: Arc<dyn ObjectStorage>,
}

impl BucketManager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Create the bucket in `region` unless it already exists
    pub async fn ensure(&self, bucket: &str, region: &str) -> Result<(), PreviewError> {
        info!("Creating S3 bucket: {}", bucket);

        let exists = self
            .storage
            .bucket_exists(bucket)
            .await
            .map_err(|e| PreviewError::lookup(Step::EnsureBucket, e))?;

        if exists {
            info!("✓ Bucket {} already exists", bucket);
            return Ok(());
        }

        self.storage
            .create_bucket(bucket, region)
            .await
            .map_err(|e| PreviewError::mutation(Step::EnsureBucket, e))?;

        info!("✓ Bucket created: {}", bucket);
        Ok(())
    }

    /// Empty and delete the bucket. Returns `false` when there was no bucket
    /// to delete.
    pub async fn destroy(&self, bucket: &str) -> Result<bool, PreviewError> {
        info!("Deleting S3 bucket: {}", bucket);

        let exists = self
            .storage
            .bucket_exists(bucket)
            .await
            .map_err(|e| PreviewError::lookup(Step::DeleteBucket, e))?;

        if !exists {
            info!("Bucket {} does not exist, skipping", bucket);
            return Ok(false);
        }

        let removed = self.empty(bucket).await?;
        debug!("Removed {} objects from {}", removed, bucket);

        self.storage
            .delete_bucket(bucket)
            .await
            .map_err(|e| PreviewError::mutation(Step::DeleteBucket, e))?;

        info!("✓ Bucket deleted: {}", bucket);
        Ok(true)
    }

    /// Delete every object, one listing page at a time
    async fn empty(&self, bucket: &str) -> Result<usize, PreviewError> {
        let mut removed = 0;
        let mut continuation = None;

        loop {
            let page = self
                .storage
                .list_keys(bucket, continuation.take())
                .await
                .map_err(|e| PreviewError::lookup(Step::DeleteBucket, e))?;

            for batch in page.keys.chunks(DELETE_BATCH_SIZE) {
                self.storage
                    .delete_objects(bucket, batch)
                    .await
                    .map_err(|e| PreviewError::mutation(Step::DeleteBucket, e))?;
                removed += batch.len();
            }

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        Ok(removed)
    }
}
