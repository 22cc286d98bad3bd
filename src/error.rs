use std::fmt;
use std::time::Duration;

use crate::distribution::state_machine::DistributionState;

/// A single step of a deploy or cleanup run, used to annotate errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    EnsureBucket,
    SyncContent,
    ManageAccessControl,
    FindDistribution,
    CreateDistribution,
    AttachBucketPolicy,
    InvalidateCache,
    ResolveHostedZone,
    UpsertDnsRecord,
    TeardownDistribution,
    DeleteDnsRecord,
    DeleteBucket,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::EnsureBucket => "create S3 bucket",
            Step::SyncContent => "sync files to S3",
            Step::ManageAccessControl => "manage origin access control",
            Step::FindDistribution => "find CloudFront distribution",
            Step::CreateDistribution => "manage CloudFront distribution",
            Step::AttachBucketPolicy => "set bucket policy",
            Step::InvalidateCache => "invalidate CloudFront cache",
            Step::ResolveHostedZone => "resolve hosted zone",
            Step::UpsertDnsRecord => "update Route53 record",
            Step::TeardownDistribution => "delete CloudFront distribution",
            Step::DeleteDnsRecord => "delete Route53 record",
            Step::DeleteBucket => "delete S3 bucket",
        };
        write!(f, "{}", s)
    }
}

/// Errors produced by a deploy or cleanup run.
///
/// Lookup and mutation failures carry the step that produced them. A wait
/// timeout is kept apart from mutation failures: the provider may still
/// finish disabling, so a later cleanup run can pick up where this one
/// stopped.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to {step}: {source:#}")]
    Lookup {
        step: Step,
        source: anyhow::Error,
    },

    #[error("failed to {step}: {source:#}")]
    Mutation {
        step: Step,
        source: anyhow::Error,
    },

    #[error(
        "timed out after {}s waiting for distribution {distribution_id} to be disabled; it may still finish, re-run cleanup to continue",
        .waited.as_secs()
    )]
    WaitTimeout {
        distribution_id: String,
        waited: Duration,
    },

    #[error("invalid distribution state transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: DistributionState,
        to: DistributionState,
    },
}

impl PreviewError {
    pub fn lookup(step: Step, source: impl Into<anyhow::Error>) -> Self {
        Self::Lookup {
            step,
            source: source.into(),
        }
    }

    pub fn mutation(step: Step, source: impl Into<anyhow::Error>) -> Self {
        Self::Mutation {
            step,
            source: source.into(),
        }
    }

    /// The step this error is attributed to, if any
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Lookup { step, .. } | Self::Mutation { step, .. } => Some(*step),
            Self::WaitTimeout { .. } | Self::InvalidTransition { .. } => {
                Some(Step::TeardownDistribution)
            }
            Self::Config(_) => None,
        }
    }
}

/// Extract a clean error message from an AWS SDK error's Debug output
///
/// The SDK's Debug output is verbose; the service message lives in a
/// `message: Some("...")` field.
pub fn format_sdk_error<E: fmt::Debug>(err: &E) -> String {
    let debug_str = format!("{:?}", err);

    if let Some(start) = debug_str.find("message: Some(\"") {
        let start = start + 15;
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    if let Some(start) = debug_str.find("code: Some(\"") {
        let start = start + 12;
        if let Some(end) = debug_str[start..].find("\")") {
            return debug_str[start..start + end].to_string();
        }
    }

    if debug_str.chars().count() > 200 {
        format!("{}...", debug_str.chars().take(200).collect::<String>())
    } else {
        debug_str
    }
}
