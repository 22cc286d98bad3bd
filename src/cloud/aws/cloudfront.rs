use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudfront::types::{
    Aliases, AllowedMethods, CachedMethods, CookiePreference, CustomErrorResponse,
    CustomErrorResponses, DefaultCacheBehavior, DistributionConfig, ForwardedValues,
    InvalidationBatch, ItemSelection, Method, MinimumProtocolVersion,
    OriginAccessControlConfig, OriginAccessControlOriginTypes,
    OriginAccessControlSigningBehaviors, OriginAccessControlSigningProtocols, Origin, Origins,
    Paths, S3OriginConfig, SslSupportMethod, TrustedSigners, ViewerCertificate as SdkCertificate,
    ViewerProtocolPolicy,
};
use aws_sdk_cloudfront::Client as CloudFrontClient;

use crate::cloud::{
    AccessControl, AccessControlSpec, Cdn, Distribution, DistributionSpec, HttpMethod,
    PropagationStatus, VersionedConfig, ViewerCertificate,
};
use crate::error::format_sdk_error;

pub struct CloudFrontCdn {
    client: CloudFrontClient,
}

impl CloudFrontCdn {
    pub fn new(client: CloudFrontClient) -> Self {
        Self { client }
    }

    async fn fetch_config(&self, id: &str) -> Result<(DistributionConfig, String)> {
        let resp = self
            .client
            .get_distribution_config()
            .id(id)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to get config of distribution {}", id))?;

        let config = resp
            .distribution_config()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Distribution {} returned no config", id))?;
        let etag = resp
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Distribution {} returned no ETag", id))?;

        Ok((config, etag))
    }
}

fn sdk_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::Get,
        HttpMethod::Head => Method::Head,
    }
}

/// Translate a distribution spec into the CloudFront request body
fn build_distribution_config(spec: &DistributionSpec) -> Result<DistributionConfig> {
    let origin = Origin::builder()
        .id(&spec.origin.id)
        .domain_name(&spec.origin.domain_name)
        // Empty legacy OAI; access goes through the origin access control
        .s3_origin_config(S3OriginConfig::builder().origin_access_identity("").build())
        .origin_access_control_id(&spec.origin.access_control_id)
        .build()?;

    let allowed: Vec<Method> = spec.allowed_methods.iter().copied().map(sdk_method).collect();
    let cached: Vec<Method> = spec.cached_methods.iter().copied().map(sdk_method).collect();

    let cache_behavior = DefaultCacheBehavior::builder()
        .target_origin_id(&spec.origin.id)
        .viewer_protocol_policy(ViewerProtocolPolicy::from(spec.viewer_protocol_policy))
        .allowed_methods(
            AllowedMethods::builder()
                .quantity(allowed.len() as i32)
                .set_items(Some(allowed))
                .cached_methods(
                    CachedMethods::builder()
                        .quantity(cached.len() as i32)
                        .set_items(Some(cached))
                        .build()?,
                )
                .build()?,
        )
        .forwarded_values(
            ForwardedValues::builder()
                .query_string(spec.forward_query_string)
                .cookies(CookiePreference::builder().forward(ItemSelection::None).build()?)
                .build()?,
        )
        .min_ttl(spec.ttl.min)
        .default_ttl(spec.ttl.default)
        .max_ttl(spec.ttl.max)
        .compress(spec.compress)
        .trusted_signers(TrustedSigners::builder().enabled(false).quantity(0).build()?)
        .build()?;

    let mut error_responses = Vec::with_capacity(spec.error_responses.len());
    for response in &spec.error_responses {
        error_responses.push(
            CustomErrorResponse::builder()
                .error_code(response.error_code)
                .response_page_path(&response.response_page_path)
                .response_code(&response.response_code)
                .error_caching_min_ttl(response.caching_min_ttl)
                .build()?,
        );
    }

    let certificate = match &spec.certificate {
        ViewerCertificate::ProviderDefault => SdkCertificate::builder()
            .cloud_front_default_certificate(true)
            .build(),
        ViewerCertificate::Acm {
            certificate_arn,
            minimum_protocol_version,
        } => SdkCertificate::builder()
            .acm_certificate_arn(certificate_arn)
            .ssl_support_method(SslSupportMethod::SniOnly)
            .minimum_protocol_version(MinimumProtocolVersion::from(*minimum_protocol_version))
            .build(),
    };

    let config = DistributionConfig::builder()
        .caller_reference(&spec.caller_reference)
        .comment(&spec.comment)
        .enabled(true)
        .aliases(Aliases::builder().quantity(1).items(&spec.alias).build()?)
        .default_root_object(&spec.default_root_object)
        .origins(Origins::builder().quantity(1).items(origin).build()?)
        .default_cache_behavior(cache_behavior)
        .custom_error_responses(
            CustomErrorResponses::builder()
                .quantity(error_responses.len() as i32)
                .set_items(Some(error_responses))
                .build()?,
        )
        .viewer_certificate(certificate)
        .build()?;

    Ok(config)
}

#[async_trait]
impl Cdn for CloudFrontCdn {
    async fn list_access_controls(&self) -> Result<Vec<AccessControl>> {
        let mut controls = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_origin_access_controls()
                .set_marker(marker.clone())
                .send()
                .await
                .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
                .context("Failed to list origin access controls")?;

            let Some(list) = resp.origin_access_control_list() else {
                break;
            };

            controls.extend(list.items().iter().map(|oac| AccessControl {
                id: oac.id().to_string(),
                name: oac.name().to_string(),
            }));

            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(controls)
    }

    async fn create_access_control(&self, spec: &AccessControlSpec) -> Result<AccessControl> {
        let config = OriginAccessControlConfig::builder()
            .name(&spec.name)
            .description(&spec.description)
            .signing_protocol(OriginAccessControlSigningProtocols::from(spec.signing_protocol))
            .signing_behavior(OriginAccessControlSigningBehaviors::from(spec.signing_behavior))
            .origin_access_control_origin_type(OriginAccessControlOriginTypes::from(
                spec.origin_type,
            ))
            .build()?;

        let resp = self
            .client
            .create_origin_access_control()
            .origin_access_control_config(config)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to create origin access control '{}'", spec.name))?;

        let oac = resp
            .origin_access_control()
            .ok_or_else(|| anyhow::anyhow!("CreateOriginAccessControl returned no entity"))?;

        Ok(AccessControl {
            id: oac.id().to_string(),
            name: spec.name.clone(),
        })
    }

    async fn list_distributions(&self) -> Result<Vec<Distribution>> {
        let mut distributions = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_distributions()
                .set_marker(marker.clone())
                .send()
                .await
                .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
                .context("Failed to list distributions")?;

            let Some(list) = resp.distribution_list() else {
                break;
            };

            distributions.extend(list.items().iter().map(|summary| Distribution {
                id: summary.id().to_string(),
                arn: summary.arn().to_string(),
                domain_name: summary.domain_name().to_string(),
                aliases: summary
                    .aliases()
                    .map(|a| a.items().to_vec())
                    .unwrap_or_default(),
                enabled: summary.enabled(),
                status: PropagationStatus::from_provider(summary.status()),
            }));

            match list.next_marker() {
                Some(next) if list.is_truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(distributions)
    }

    async fn create_distribution(&self, spec: &DistributionSpec) -> Result<Distribution> {
        let config = build_distribution_config(spec)
            .context("Failed to build distribution config")?;

        let resp = self
            .client
            .create_distribution()
            .distribution_config(config)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to create distribution for {}", spec.alias))?;

        let dist = resp
            .distribution()
            .ok_or_else(|| anyhow::anyhow!("CreateDistribution returned no distribution"))?;

        Ok(Distribution {
            id: dist.id().to_string(),
            arn: dist.arn().to_string(),
            domain_name: dist.domain_name().to_string(),
            aliases: vec![spec.alias.clone()],
            enabled: true,
            status: PropagationStatus::from_provider(dist.status()),
        })
    }

    async fn get_distribution(&self, id: &str) -> Result<Distribution> {
        let resp = self
            .client
            .get_distribution()
            .id(id)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to get distribution {}", id))?;

        let dist = resp
            .distribution()
            .ok_or_else(|| anyhow::anyhow!("GetDistribution returned no distribution"))?;
        let config = dist.distribution_config();

        Ok(Distribution {
            id: dist.id().to_string(),
            arn: dist.arn().to_string(),
            domain_name: dist.domain_name().to_string(),
            aliases: config
                .and_then(|c| c.aliases())
                .map(|a| a.items().to_vec())
                .unwrap_or_default(),
            enabled: config.map(|c| c.enabled()).unwrap_or(false),
            status: PropagationStatus::from_provider(dist.status()),
        })
    }

    async fn get_distribution_config(&self, id: &str) -> Result<VersionedConfig> {
        let (config, etag) = self.fetch_config(id).await?;
        Ok(VersionedConfig {
            enabled: config.enabled(),
            version: etag,
        })
    }

    async fn set_distribution_enabled(
        &self,
        id: &str,
        enabled: bool,
        if_match: &str,
    ) -> Result<()> {
        // UpdateDistribution replaces the whole config, so start from the
        // current body; the caller's token decides whether it is still valid.
        let (mut config, _) = self.fetch_config(id).await?;
        config.enabled = enabled;

        self.client
            .update_distribution()
            .id(id)
            .distribution_config(config)
            .if_match(if_match)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to update distribution {}", id))?;

        Ok(())
    }

    async fn delete_distribution(&self, id: &str, if_match: &str) -> Result<()> {
        self.client
            .delete_distribution()
            .id(id)
            .if_match(if_match)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to delete distribution {}", id))?;

        Ok(())
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<String> {
        let batch = InvalidationBatch::builder()
            .caller_reference(caller_reference)
            .paths(
                Paths::builder()
                    .quantity(paths.len() as i32)
                    .set_items(Some(paths.to_vec()))
                    .build()?,
            )
            .build()?;

        let resp = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to invalidate distribution {}", distribution_id))?;

        Ok(resp
            .invalidation()
            .map(|inv| inv.id().to_string())
            .unwrap_or_default())
    }
}
