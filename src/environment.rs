use regex::Regex;

/// Deterministic addressing for one preview environment.
///
/// Every resource name is derived from the environment key (the pull request
/// number), the application name and the base domain. Re-running with the same
/// inputs always targets the same bucket, access control, distribution alias
/// and DNS record, so no state needs to be kept between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentIdentity {
    key: u64,
    app: String,
    base_domain: String,
    bucket_name: String,
    hostname: String,
}

impl EnvironmentIdentity {
    pub fn new(key: u64, app: &str, base_domain: &str) -> Self {
        let base_domain = base_domain.trim_end_matches('.').to_string();
        let bucket_name = bucket_name(key, app);
        let hostname = format!("{}.{}", bucket_name, base_domain);

        Self {
            key,
            app: app.to_string(),
            base_domain,
            bucket_name,
            hostname,
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Custom hostname the distribution answers on (`pr-42-site.example.test`)
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn access_control_name(&self) -> String {
        format!("OAC-{}", self.bucket_name)
    }

    pub fn origin_id(&self) -> String {
        format!("S3-{}", self.bucket_name)
    }

    pub fn preview_url(&self) -> String {
        format!("https://{}", self.hostname)
    }
}

/// Bucket name for an environment: `pr-{key}-{app}`
pub fn bucket_name(key: u64, app: &str) -> String {
    format!("pr-{}-{}", key, app)
}

/// Validate an S3 bucket name: lowercase letters, digits and hyphens,
/// 3 to 63 characters, starting and ending with a letter or digit.
pub fn is_valid_bucket_name(name: &str) -> bool {
    if name.len() < 3 || name.len() > 63 {
        return false;
    }

    Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$")
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}
