//! Deploy and cleanup orchestration.
//!
//! Deploy creates or confirms every resource in dependency order: bucket,
//! content, access control, distribution, bucket policy, invalidation, DNS.
//! Each step checks for an existing resource first, so a run that failed
//! half way is finished by running it again; nothing is rolled back.
//!
//! Cleanup removes resources in the reverse direction of their dependencies:
//! the distribution first (it reads from the bucket), then the DNS record,
//! then the bucket.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::access_control::AccessControlManager;
use crate::bucket::BucketManager;
use crate::bucket_policy::BucketPolicyManager;
use crate::cloud::{Cdn, Dns, ObjectStorage};
use crate::distribution::state_machine::DistributionState;
use crate::distribution::{DistributionManager, WaitPolicy};
use crate::dns::DnsRecordManager;
use crate::environment::EnvironmentIdentity;
use crate::error::{PreviewError, Step};
use crate::invalidation::CacheInvalidator;
use crate::notify::{cleanup_comment, deployed_comment, Notifier};
use crate::sync::ContentSync;

/// Repository whose pull request thread receives status comments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub env: EnvironmentIdentity,
    pub region: String,
    pub source_dir: PathBuf,
    pub certificate_arn: Option<String>,
    pub repository: Repository,
}

#[derive(Debug, Clone)]
pub struct CleanupRequest {
    pub env: EnvironmentIdentity,
    pub repository: Repository,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub hostname: String,
    pub url: String,
    pub distribution_id: String,
    pub files_uploaded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub hostname: String,
    /// States the distribution passed through, `None` if there was none
    pub distribution_transitions: Option<Vec<DistributionState>>,
    pub dns_record_deleted: bool,
    pub bucket_deleted: bool,
}

pub struct EnvironmentController {
    storage: Arc<dyn ObjectStorage>,
    cdn: Arc<dyn Cdn>,
    dns: Arc<dyn Dns>,
    notifier: Arc<dyn Notifier>,
    wait: WaitPolicy,
}

impl EnvironmentController {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        cdn: Arc<dyn Cdn>,
        dns: Arc<dyn Dns>,
        notifier: Arc<dyn Notifier>,
        wait: WaitPolicy,
    ) -> Self {
        Self {
            storage,
            cdn,
            dns,
            notifier,
            wait,
        }
    }

    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployReport, PreviewError> {
        let env = &request.env;
        info!(
            "Deploying preview environment for {} PR #{} to {}",
            env.app(),
            env.key(),
            env.hostname()
        );

        BucketManager::new(self.storage.clone())
            .ensure(env.bucket_name(), &request.region)
            .await?;

        let files_uploaded = ContentSync::new(self.storage.clone())
            .sync(&request.source_dir, env.bucket_name())
            .await?;

        let access_control_id = AccessControlManager::new(self.cdn.clone())
            .get_or_create(env)
            .await?;

        let distribution = DistributionManager::new(self.cdn.clone(), self.wait)
            .get_or_create(
                env,
                &request.region,
                &access_control_id,
                request.certificate_arn.as_deref(),
            )
            .await?;

        BucketPolicyManager::new(self.storage.clone())
            .attach(env.bucket_name(), &distribution.arn)
            .await?;

        CacheInvalidator::new(self.cdn.clone())
            .invalidate_all(&distribution.id)
            .await?;

        let dns = DnsRecordManager::new(self.dns.clone());
        let zone = dns.resolve_zone(env.base_domain()).await?.ok_or_else(|| {
            PreviewError::lookup(
                Step::ResolveHostedZone,
                anyhow::anyhow!("hosted zone {} not found", env.base_domain()),
            )
        })?;
        info!("Found hosted zone {} ({})", zone.name, zone.id);
        dns.upsert(&zone, env.hostname(), &distribution.domain_name)
            .await?;

        self.notify(&request.repository, env.key(), &deployed_comment(env))
            .await;

        Ok(DeployReport {
            hostname: env.hostname().to_string(),
            url: env.preview_url(),
            distribution_id: distribution.id,
            files_uploaded,
        })
    }

    pub async fn cleanup(&self, request: &CleanupRequest) -> Result<CleanupReport, PreviewError> {
        let env = &request.env;
        info!(
            "Cleaning up preview environment for PR #{} ({})",
            env.key(),
            env.hostname()
        );

        let distributions = DistributionManager::new(self.cdn.clone(), self.wait);
        let distribution_transitions = match distributions.find_by_alias(env.hostname()).await? {
            Some(distribution) => Some(distributions.teardown(&distribution.id).await?),
            None => {
                info!("No distribution found for {}, skipping", env.hostname());
                None
            }
        };

        let dns_record_deleted = self.delete_dns_record(env).await;

        let bucket_deleted = BucketManager::new(self.storage.clone())
            .destroy(env.bucket_name())
            .await?;

        self.notify(&request.repository, env.key(), &cleanup_comment(env))
            .await;

        Ok(CleanupReport {
            hostname: env.hostname().to_string(),
            distribution_transitions,
            dns_record_deleted,
            bucket_deleted,
        })
    }

    /// Never fails: a missing zone or record and a rejected delete are logged
    /// and cleanup moves on to the bucket
    async fn delete_dns_record(&self, env: &EnvironmentIdentity) -> bool {
        let dns = DnsRecordManager::new(self.dns.clone());

        let zone = match dns.resolve_zone(env.base_domain()).await {
            Ok(Some(zone)) => zone,
            Ok(None) => {
                warn!(
                    "Hosted zone {} not found, skipping DNS cleanup",
                    env.base_domain()
                );
                return false;
            }
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        match dns.delete(&zone, env.hostname()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    async fn notify(&self, repository: &Repository, issue: u64, body: &str) {
        if let Err(e) = self
            .notifier
            .post_comment(&repository.owner, &repository.name, issue, body)
            .await
        {
            warn!("Failed to post GitHub comment: {:#}", e);
        }
    }
}
