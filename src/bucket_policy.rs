use std::sync::Arc;

use tracing::info;

use crate::cloud::ObjectStorage;
use crate::error::{PreviewError, Step};

/// Policy granting the CloudFront service principal read access to the
/// bucket's objects, scoped to requests from one distribution
pub fn policy_document(bucket: &str, distribution_arn: &str) -> serde_json::Value {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "AllowCloudFrontServicePrincipal",
                "Effect": "Allow",
                "Principal": {
                    "Service": "cloudfront.amazonaws.com"
                },
                "Action": "s3:GetObject",
                "Resource": format!("arn:aws:s3:::{}/*", bucket),
                "Condition": {
                    "StringEquals": {
                        "AWS:SourceArn": distribution_arn
                    }
                }
            }
        ]
    })
}

pub struct BucketPolicyManager {
    storage: Arc<dyn ObjectStorage>,
}

impl BucketPolicyManager {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Replace whatever policy the bucket has with the distribution-scoped one
    pub async fn attach(&self, bucket: &str, distribution_arn: &str) -> Result<(), PreviewError> {
        info!("Setting S3 bucket policy for CloudFront access...");

        let policy = policy_document(bucket, distribution_arn).to_string();
        self.storage
            .put_bucket_policy(bucket, &policy)
            .await
            .map_err(|e| PreviewError::mutation(Step::AttachBucketPolicy, e))?;

        info!("✓ Bucket policy set");
        Ok(())
    }
}
