mod cloudfront;
mod route53;
mod s3;

pub use cloudfront::CloudFrontCdn;
pub use route53::Route53Dns;
pub use s3::S3Storage;

use aws_config::BehaviorVersion;

/// SDK-backed implementations of the provider traits, sharing one AWS config
pub struct AwsClients {
    pub storage: S3Storage,
    pub cdn: CloudFrontCdn,
    pub dns: Route53Dns,
}

impl AwsClients {
    /// Load credentials from the default chain (env vars, profile, IAM role)
    pub async fn load(region: &str) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;

        tracing::debug!("Loaded AWS configuration for region {}", region);

        Self {
            storage: S3Storage::new(aws_sdk_s3::Client::new(&aws_config)),
            cdn: CloudFrontCdn::new(aws_sdk_cloudfront::Client::new(&aws_config)),
            dns: Route53Dns::new(aws_sdk_route53::Client::new(&aws_config)),
        }
    }
}
