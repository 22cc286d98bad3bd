use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client as S3Client;

use crate::cloud::{ContentItem, KeyPage, ObjectStorage};
use crate::error::format_sdk_error;

pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_not_found() {
                        return Ok(false);
                    }
                }
                Err(anyhow::anyhow!(
                    "Failed to check bucket '{}': {}",
                    bucket,
                    format_sdk_error(&err)
                ))
            }
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if region != "us-east-1" {
            let config = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            request = request.create_bucket_configuration(config);
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_bucket_already_owned_by_you() {
                        return Ok(());
                    }
                }
                Err(anyhow::anyhow!(
                    "Failed to create bucket '{}': {}",
                    bucket,
                    format_sdk_error(&err)
                ))
            }
        }
    }

    async fn put_object(&self, bucket: &str, item: ContentItem) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(item.key)
            .content_type(item.content_type)
            .body(ByteStream::from(item.body))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))?;

        Ok(())
    }

    async fn list_keys(&self, bucket: &str, continuation: Option<String>) -> Result<KeyPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1000)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to list objects in '{}'", bucket))?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        let next_token = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(KeyPage { keys, next_token })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let mut objects = Vec::with_capacity(keys.len());
        for key in keys {
            objects.push(ObjectIdentifier::builder().key(key).build()?);
        }

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to delete objects from '{}'", bucket))?;

        if let Some(first) = resp.errors().first() {
            anyhow::bail!(
                "Failed to delete {} object(s) from '{}', first: {} ({})",
                resp.errors().len(),
                bucket,
                first.key().unwrap_or("<unknown>"),
                first.message().unwrap_or("no message")
            );
        }

        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))?;

        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        self.client
            .put_bucket_policy()
            .bucket(bucket)
            .policy(policy)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))?;

        Ok(())
    }
}
