use std::sync::Arc;

use tracing::info;

use crate::cloud::{AccessControlSpec, Cdn};
use crate::environment::EnvironmentIdentity;
use crate::error::{PreviewError, Step};

pub const SIGNING_PROTOCOL: &str = "sigv4";
pub const SIGNING_BEHAVIOR: &str = "always";
pub const ORIGIN_TYPE: &str = "s3";

/// Finds or creates the origin access control the distribution uses to read
/// from the bucket
pub struct AccessControlManager {
    cdn: Arc<dyn Cdn>,
}

impl AccessControlManager {
    pub fn new(cdn: Arc<dyn Cdn>) -> Self {
        Self { cdn }
    }

    /// Configuration for a new access control for this environment
    pub fn spec_for(env: &EnvironmentIdentity) -> AccessControlSpec {
        AccessControlSpec {
            name: env.access_control_name(),
            description: format!("OAC for PR #{} preview environment", env.key()),
            signing_protocol: SIGNING_PROTOCOL,
            signing_behavior: SIGNING_BEHAVIOR,
            origin_type: ORIGIN_TYPE,
        }
    }

    /// Id of the access control named `name`, if one exists.
    ///
    /// The provider has no filter by name, so every call lists all access
    /// controls in the account and compares names exactly.
    pub async fn find(&self, name: &str) -> Result<Option<String>, PreviewError> {
        let controls = self
            .cdn
            .list_access_controls()
            .await
            .map_err(|e| PreviewError::lookup(Step::ManageAccessControl, e))?;

        Ok(controls
            .into_iter()
            .find(|oac| oac.name == name)
            .map(|oac| oac.id))
    }

    /// Return the id of the environment's access control, creating it if
    /// needed. An existing access control is never modified.
    pub async fn get_or_create(&self, env: &EnvironmentIdentity) -> Result<String, PreviewError> {
        info!("Managing Origin Access Control...");
        let spec = Self::spec_for(env);

        if let Some(id) = self.find(&spec.name).await? {
            info!("✓ Using existing OAC: {}", id);
            return Ok(id);
        }

        info!("Creating new Origin Access Control '{}'", spec.name);
        let created = self
            .cdn
            .create_access_control(&spec)
            .await
            .map_err(|e| PreviewError::mutation(Step::ManageAccessControl, e))?;

        info!("✓ OAC created: {}", created.id);
        Ok(created.id)
    }
}
