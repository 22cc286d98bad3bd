use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::environment::EnvironmentIdentity;

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Posts status messages to a pull request thread.
///
/// Callers treat failures as warnings; a failed comment never fails a run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_comment(&self, owner: &str, repo: &str, issue: u64, body: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

/// Issue comments through the GitHub REST API
pub struct GitHubNotifier {
    http_client: Client,
    api_url: String,
    token: String,
}

impl GitHubNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(GITHUB_API_URL, token)
    }

    pub fn with_api_url(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn comments_url(&self, owner: &str, repo: &str, issue: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, owner, repo, issue
        )
    }
}

#[async_trait]
impl Notifier for GitHubNotifier {
    async fn post_comment(&self, owner: &str, repo: &str, issue: u64, body: &str) -> Result<()> {
        let url = self.comments_url(owner, repo, issue);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "preview-env")
            .json(&CreateCommentRequest { body })
            .send()
            .await
            .context("Failed to send comment request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!(
                "Failed to post comment on {}/{}#{} (status {}): {}",
                owner,
                repo,
                issue,
                status,
                error_text
            );
        }

        info!("✓ Posted comment on {}/{}#{}", owner, repo, issue);
        Ok(())
    }
}

/// Used when no token is configured
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn post_comment(&self, owner: &str, repo: &str, issue: u64, _body: &str) -> Result<()> {
        info!(
            "GITHUB_TOKEN not set, skipping comment on {}/{}#{}",
            owner, repo, issue
        );
        Ok(())
    }
}

pub fn deployed_comment(env: &EnvironmentIdentity) -> String {
    format!(
        "## Preview Environment Deployed Successfully! 🚀\n\n\
         Your preview environment is now available at:\n\
         **{}**\n\n\
         Note: Initial deployment may take 3-5 minutes for CloudFront to propagate globally.",
        env.preview_url()
    )
}

pub fn cleanup_comment(env: &EnvironmentIdentity) -> String {
    format!(
        "## Preview Environment Cleanup Complete 🧹\n\n\
         The preview environment for PR #{} has been successfully cleaned up.\n\n\
         All resources have been removed:\n\
         - CloudFront distribution\n\
         - Route53 DNS records\n\
         - S3 bucket and contents",
        env.key()
    )
}
