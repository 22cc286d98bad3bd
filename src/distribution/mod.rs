pub mod state_machine;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::cloud::{
    CacheTtl, Cdn, Distribution, DistributionSpec, ErrorResponseSpec, HttpMethod, OriginSpec,
    PropagationStatus, VersionedConfig, ViewerCertificate,
};
use crate::environment::EnvironmentIdentity;
use crate::error::{PreviewError, Step};
use state_machine::{can_delete, observed_state, validate_transition, DistributionState};

pub const VIEWER_PROTOCOL_POLICY: &str = "redirect-to-https";
pub const MINIMUM_PROTOCOL_VERSION: &str = "TLSv1.3_2025";
pub const DEFAULT_ROOT_OBJECT: &str = "index.html";

pub const CACHE_TTL: CacheTtl = CacheTtl {
    min: 0,
    default: 86400,
    max: 31536000,
};

/// How long teardown waits for a disabled distribution to finish deploying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            interval: Duration::from_secs(30),
        }
    }
}

/// Build the configuration of a new distribution for an environment.
///
/// 404s are answered with `/index.html` and status 200 so client-side routed
/// single page apps resolve deep links. Without a certificate the provider's
/// shared certificate is used, which does not cover the custom alias over
/// HTTPS.
pub fn distribution_spec(
    env: &EnvironmentIdentity,
    region: &str,
    access_control_id: &str,
    certificate_arn: Option<&str>,
    created_at: i64,
) -> DistributionSpec {
    let certificate = match certificate_arn {
        Some(arn) if !arn.is_empty() => ViewerCertificate::Acm {
            certificate_arn: arn.to_string(),
            minimum_protocol_version: MINIMUM_PROTOCOL_VERSION,
        },
        _ => ViewerCertificate::ProviderDefault,
    };

    DistributionSpec {
        caller_reference: format!("pr-{}-{}", env.key(), created_at),
        comment: format!("PR #{} Preview Environment", env.key()),
        alias: env.hostname().to_string(),
        default_root_object: DEFAULT_ROOT_OBJECT.to_string(),
        origin: OriginSpec {
            id: env.origin_id(),
            domain_name: format!("{}.s3.{}.amazonaws.com", env.bucket_name(), region),
            access_control_id: access_control_id.to_string(),
        },
        viewer_protocol_policy: VIEWER_PROTOCOL_POLICY,
        allowed_methods: vec![HttpMethod::Get, HttpMethod::Head],
        cached_methods: vec![HttpMethod::Get, HttpMethod::Head],
        forward_query_string: false,
        compress: true,
        ttl: CACHE_TTL,
        error_responses: vec![ErrorResponseSpec {
            error_code: 404,
            response_page_path: "/index.html".to_string(),
            response_code: "200".to_string(),
            caching_min_ttl: 300,
        }],
        certificate,
    }
}

/// Records the states a teardown passes through, refusing invalid moves
struct Transitions {
    history: Vec<DistributionState>,
}

impl Transitions {
    fn start(state: DistributionState) -> Self {
        Self {
            history: vec![state],
        }
    }

    fn state(&self) -> DistributionState {
        self.history
            .last()
            .copied()
            .unwrap_or(DistributionState::Absent)
    }

    fn advance(&mut self, to: DistributionState) -> Result<(), PreviewError> {
        validate_transition(self.state(), to)?;
        debug!("Distribution state {} -> {}", self.state(), to);
        self.history.push(to);
        Ok(())
    }
}

/// Owns the CloudFront distribution of an environment: lookup by alias,
/// creation, and the disable, wait, delete teardown
pub struct DistributionManager {
    cdn: Arc<dyn Cdn>,
    wait: WaitPolicy,
}

impl DistributionManager {
    pub fn new(cdn: Arc<dyn Cdn>, wait: WaitPolicy) -> Self {
        Self { cdn, wait }
    }

    /// Find the distribution whose aliases contain `hostname`.
    ///
    /// There is no index by alias: every distribution in the account is
    /// listed and scanned. `None` means the distribution does not exist yet.
    pub async fn find_by_alias(&self, hostname: &str) -> Result<Option<Distribution>, PreviewError> {
        let distributions = self
            .cdn
            .list_distributions()
            .await
            .map_err(|e| PreviewError::lookup(Step::FindDistribution, e))?;

        Ok(distributions
            .into_iter()
            .find(|d| d.aliases.iter().any(|alias| alias == hostname)))
    }

    /// Create a distribution for the environment
    pub async fn create(
        &self,
        env: &EnvironmentIdentity,
        region: &str,
        access_control_id: &str,
        certificate_arn: Option<&str>,
    ) -> Result<Distribution, PreviewError> {
        info!("Creating new CloudFront distribution...");
        let spec = distribution_spec(
            env,
            region,
            access_control_id,
            certificate_arn,
            chrono::Utc::now().timestamp(),
        );

        let mut transitions = Transitions::start(DistributionState::Absent);
        transitions.advance(DistributionState::Creating)?;

        let created = self
            .cdn
            .create_distribution(&spec)
            .await
            .map_err(|e| PreviewError::mutation(Step::CreateDistribution, e))?;
        transitions.advance(DistributionState::Enabled)?;

        info!("✓ Distribution created: {}", created.id);
        Ok(created)
    }

    /// Return the environment's distribution, creating it if none carries the
    /// environment's hostname as alias
    pub async fn get_or_create(
        &self,
        env: &EnvironmentIdentity,
        region: &str,
        access_control_id: &str,
        certificate_arn: Option<&str>,
    ) -> Result<Distribution, PreviewError> {
        info!("Managing CloudFront distribution...");

        if let Some(existing) = self.find_by_alias(env.hostname()).await? {
            info!(
                "✓ Using existing distribution: {} (enabled: {})",
                existing.id, existing.enabled
            );
            return Ok(existing);
        }

        self.create(env, region, access_control_id, certificate_arn)
            .await
    }

    async fn config(&self, id: &str) -> Result<VersionedConfig, PreviewError> {
        self.cdn
            .get_distribution_config(id)
            .await
            .map_err(|e| PreviewError::lookup(Step::TeardownDistribution, e))
    }

    async fn describe(&self, id: &str) -> Result<Distribution, PreviewError> {
        self.cdn
            .get_distribution(id)
            .await
            .map_err(|e| PreviewError::lookup(Step::TeardownDistribution, e))
    }

    /// Poll until the provider reports the distribution as deployed, or fail
    /// with a wait timeout once the policy's ceiling has elapsed
    async fn wait_until_deployed(&self, id: &str) -> Result<PropagationStatus, PreviewError> {
        let started = Instant::now();

        loop {
            let current = self.describe(id).await?;
            if current.status == PropagationStatus::Deployed {
                return Ok(current.status);
            }

            let waited = started.elapsed();
            if waited >= self.wait.timeout {
                return Err(PreviewError::WaitTimeout {
                    distribution_id: id.to_string(),
                    waited,
                });
            }

            debug!(
                "Distribution {} still in progress after {}s",
                id,
                waited.as_secs()
            );
            sleep(self.wait.interval.min(self.wait.timeout - waited)).await;
        }
    }

    /// Disable, wait for, and delete a distribution.
    ///
    /// Returns the states the distribution passed through. Delete is only
    /// issued after a fresh config read reports the distribution disabled and
    /// its change deployed; the version token from that read is the one
    /// presented, since the disable update invalidates the earlier token.
    pub async fn teardown(&self, id: &str) -> Result<Vec<DistributionState>, PreviewError> {
        info!("Deleting CloudFront distribution: {}", id);

        let config = self.config(id).await?;
        let mut status = self.describe(id).await?.status;
        let mut transitions = Transitions::start(observed_state(&config, status));

        if transitions.state() == DistributionState::Enabled {
            info!("Disabling distribution...");
            self.cdn
                .set_distribution_enabled(id, false, &config.version)
                .await
                .map_err(|e| PreviewError::mutation(Step::TeardownDistribution, e))?;
            transitions.advance(DistributionState::Disabling)?;
        }

        if transitions.state() == DistributionState::Disabling {
            info!("Waiting for distribution to be disabled...");
            status = self.wait_until_deployed(id).await?;
            transitions.advance(DistributionState::Disabled)?;
        }

        let fresh = self.config(id).await?;
        let observed = observed_state(&fresh, status);
        if !can_delete(observed) {
            return Err(PreviewError::InvalidTransition {
                from: observed,
                to: DistributionState::Deleting,
            });
        }

        transitions.advance(DistributionState::Deleting)?;
        info!("Deleting distribution...");
        self.cdn
            .delete_distribution(id, &fresh.version)
            .await
            .map_err(|e| PreviewError::mutation(Step::TeardownDistribution, e))?;
        transitions.advance(DistributionState::Absent)?;

        info!("✓ Distribution deleted");
        Ok(transitions.history)
    }
}
