//! Provider-facing traits and the records exchanged with them.
//!
//! Each trait mirrors one provider API surface. The managers in this crate
//! only depend on these traits, so the "list everything and scan" lookups
//! performed today can later be swapped for an indexed lookup without the
//! controller noticing, and tests can run against an in-memory fake.

pub mod aws;

use anyhow::Result;
use async_trait::async_trait;

/// One object to upload: key relative to the bucket root, payload and MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// One page of object keys from a bucket listing
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// Object store operations (S3)
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()>;

    async fn put_object(&self, bucket: &str, item: ContentItem) -> Result<()>;

    async fn list_keys(&self, bucket: &str, continuation: Option<String>) -> Result<KeyPage>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Replace the bucket policy with `policy` (a JSON document)
    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;
}

/// Origin access control as listed by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControl {
    pub id: String,
    pub name: String,
}

/// Configuration for a new origin access control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlSpec {
    pub name: String,
    pub description: String,
    pub signing_protocol: &'static str,
    pub signing_behavior: &'static str,
    pub origin_type: &'static str,
}

/// Propagation status reported by the CDN for a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationStatus {
    InProgress,
    Deployed,
}

impl PropagationStatus {
    pub fn from_provider(status: &str) -> Self {
        if status == "Deployed" {
            Self::Deployed
        } else {
            Self::InProgress
        }
    }
}

/// Distribution as listed or described by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub arn: String,
    pub domain_name: String,
    pub aliases: Vec<String>,
    pub enabled: bool,
    pub status: PropagationStatus,
}

/// The part of a distribution's configuration the teardown needs, together
/// with the version token (ETag) every mutating call must present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedConfig {
    pub enabled: bool,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSpec {
    pub id: String,
    pub domain_name: String,
    pub access_control_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub min: i64,
    pub default: i64,
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponseSpec {
    pub error_code: i32,
    pub response_page_path: String,
    pub response_code: String,
    pub caching_min_ttl: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCertificate {
    /// The provider's shared `*.cloudfront.net` certificate
    ProviderDefault,
    /// An ACM certificate served with SNI only
    Acm {
        certificate_arn: String,
        minimum_protocol_version: &'static str,
    },
}

/// Full configuration of a new distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSpec {
    pub caller_reference: String,
    pub comment: String,
    pub alias: String,
    pub default_root_object: String,
    pub origin: OriginSpec,
    pub viewer_protocol_policy: &'static str,
    pub allowed_methods: Vec<HttpMethod>,
    pub cached_methods: Vec<HttpMethod>,
    pub forward_query_string: bool,
    pub compress: bool,
    pub ttl: CacheTtl,
    pub error_responses: Vec<ErrorResponseSpec>,
    pub certificate: ViewerCertificate,
}

/// CDN operations (CloudFront): origin access controls, distributions and
/// invalidations
#[async_trait]
pub trait Cdn: Send + Sync {
    async fn list_access_controls(&self) -> Result<Vec<AccessControl>>;

    async fn create_access_control(&self, spec: &AccessControlSpec) -> Result<AccessControl>;

    async fn list_distributions(&self) -> Result<Vec<Distribution>>;

    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<Distribution>;

    async fn get_distribution(&self, id: &str) -> Result<Distribution>;

    async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig>;

    /// Flip the enabled flag, presenting `if_match` as the version token
    async fn set_distribution_enabled(&self, id: &str, enabled: bool, if_match: &str)
        -> Result<()>;

    async fn delete_distribution(&self, id: &str, if_match: &str) -> Result<()>;

    /// Submit an invalidation and return its id
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Cname,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Cname => "CNAME",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Upsert,
    Delete,
}

/// A DNS record set as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

/// DNS operations (Route53)
#[async_trait]
pub trait Dns: Send + Sync {
    /// Hosted zones in name order, starting at `dns_name`
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>>;

    /// Record sets in name order, starting at `name`/`record_type`
    async fn list_record_sets(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
        max_items: i32,
    ) -> Result<Vec<RecordSet>>;

    async fn change_record_set(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> Result<()>;
}
