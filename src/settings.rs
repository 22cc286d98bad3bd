use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::controller::{CleanupRequest, DeployRequest, Repository};
use crate::distribution::WaitPolicy;
use crate::environment::{bucket_name, is_valid_bucket_name, EnvironmentIdentity};
use crate::error::PreviewError;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SOURCE_DIR: &str = "./dist";
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 20 * 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Pull request number; the environment key
    #[serde(default)]
    pub pr_number: u64,
    #[serde(default)]
    pub app_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub base_domain: String,
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// ACM certificate for the custom hostname (must live in us-east-1)
    #[serde(default)]
    pub certificate_arn: Option<String>,
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub wait: WaitSettings,
}

/// Ceiling and poll interval for the distribution disable wait
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    #[serde(default = "default_wait_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_DIR)
}

fn default_wait_timeout_secs() -> u64 {
    DEFAULT_WAIT_TIMEOUT_SECS
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Values given on the command line; set values win over every other layer
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pr_number: Option<u64>,
    pub app_name: Option<String>,
    pub region: Option<String>,
    pub base_domain: Option<String>,
    pub source_dir: Option<String>,
    pub certificate_arn: Option<String>,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
}

impl Settings {
    /// Assemble settings from defaults, an optional config file, `PREVIEW_*`
    /// environment variables and command line overrides, in that order.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self, PreviewError> {
        Self::build(config_file, overrides).map_err(|e| PreviewError::Config(e.to_string()))
    }

    fn build(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("region", DEFAULT_REGION)?
            .set_default("source_dir", DEFAULT_SOURCE_DIR)?
            .set_default("wait.timeout_secs", DEFAULT_WAIT_TIMEOUT_SECS)?
            .set_default("wait.poll_interval_secs", DEFAULT_POLL_INTERVAL_SECS)?;

        if let Some(path) = config_file {
            tracing::info!("Loading config file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Eg. `PREVIEW_BASE_DOMAIN` sets `base_domain`, `PREVIEW_WAIT__TIMEOUT_SECS`
            // sets `wait.timeout_secs`
            .add_source(
                Environment::with_prefix("PREVIEW")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("pr_number", overrides.pr_number)?
            .set_override_option("app_name", overrides.app_name.clone())?
            .set_override_option("region", overrides.region.clone())?
            .set_override_option("base_domain", overrides.base_domain.clone())?
            .set_override_option("source_dir", overrides.source_dir.clone())?
            .set_override_option("certificate_arn", overrides.certificate_arn.clone())?
            .set_override_option("repo_owner", overrides.repo_owner.clone())?
            .set_override_option("repo_name", overrides.repo_name.clone())?
            .build()?;

        let mut unused_fields = Vec::new();
        let settings: Settings = serde_ignored::deserialize(config, |path| {
            unused_fields.push(path.to_string());
        })?;

        for field in &unused_fields {
            tracing::warn!("Unknown configuration field: {}", field);
        }

        Ok(settings)
    }

    /// Checks shared by deploy and cleanup. Runs before any cloud call.
    pub fn validate(&self) -> Result<(), PreviewError> {
        if self.pr_number == 0 {
            return Err(PreviewError::Config(
                "PR number is required and must be greater than zero (--pr)".to_string(),
            ));
        }

        let required = [
            (&self.app_name, "app name (--app)"),
            (&self.base_domain, "base domain (--domain)"),
            (&self.region, "region (--region)"),
            (&self.repo_owner, "repository owner (--repo-owner)"),
            (&self.repo_name, "repository name (--repo-name)"),
        ];
        for (value, name) in required {
            if value.trim().is_empty() {
                return Err(PreviewError::Config(format!("{} is required", name)));
            }
        }

        let bucket = bucket_name(self.pr_number, &self.app_name);
        if !is_valid_bucket_name(&bucket) {
            return Err(PreviewError::Config(format!(
                "app name '{}' yields invalid bucket name '{}': use lowercase letters, digits and hyphens, at most 63 characters in total",
                self.app_name, bucket
            )));
        }

        Ok(())
    }

    pub fn environment(&self) -> EnvironmentIdentity {
        EnvironmentIdentity::new(self.pr_number, &self.app_name, &self.base_domain)
    }

    pub fn repository(&self) -> Repository {
        Repository {
            owner: self.repo_owner.clone(),
            name: self.repo_name.clone(),
        }
    }

    pub fn wait_policy(&self) -> Result<WaitPolicy, PreviewError> {
        if self.wait.poll_interval_secs == 0 {
            return Err(PreviewError::Config(
                "wait.poll_interval_secs must be greater than zero".to_string(),
            ));
        }

        Ok(WaitPolicy {
            timeout: Duration::from_secs(self.wait.timeout_secs),
            interval: Duration::from_secs(self.wait.poll_interval_secs),
        })
    }

    pub fn deploy_request(&self) -> Result<DeployRequest, PreviewError> {
        self.validate()?;

        if !self.source_dir.is_dir() {
            return Err(PreviewError::Config(format!(
                "source directory {} does not exist or is not a directory",
                self.source_dir.display()
            )));
        }

        Ok(DeployRequest {
            env: self.environment(),
            region: self.region.clone(),
            source_dir: self.source_dir.clone(),
            certificate_arn: self
                .certificate_arn
                .clone()
                .filter(|arn| !arn.trim().is_empty()),
            repository: self.repository(),
        })
    }

    pub fn cleanup_request(&self) -> Result<CleanupRequest, PreviewError> {
        self.validate()?;

        Ok(CleanupRequest {
            env: self.environment(),
            repository: self.repository(),
        })
    }
}
