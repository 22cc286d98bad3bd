use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod access_control;
mod bucket;
mod bucket_policy;
mod cloud;
mod controller;
mod distribution;
mod dns;
mod environment;
mod error;
mod invalidation;
mod notify;
mod settings;
mod sync;
#[cfg(test)]
mod testing;

use cloud::aws::AwsClients;
use controller::EnvironmentController;
use error::PreviewError;
use notify::{DisabledNotifier, GitHubNotifier, Notifier};
use settings::{Overrides, Settings};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (TOML or YAML) with defaults for any of the flags below
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// GitHub token used to comment on the pull request; commenting is
    /// skipped when unset
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or update the preview environment for a pull request
    Deploy {
        #[command(flatten)]
        target: TargetArgs,
        /// Directory with the built static site
        #[arg(long)]
        source: Option<String>,
        /// ACM certificate ARN for the preview hostname (must be in us-east-1)
        #[arg(long)]
        cert: Option<String>,
    },
    /// Tear down the preview environment for a pull request
    #[command(visible_alias = "destroy")]
    Cleanup {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Pull request number
    #[arg(long)]
    pr: Option<u64>,
    /// Application name
    #[arg(long)]
    app: Option<String>,
    /// AWS region for the bucket (default: us-east-1)
    #[arg(long)]
    region: Option<String>,
    /// Base domain with an existing Route53 hosted zone
    #[arg(long)]
    domain: Option<String>,
    /// Repository owner for the pull request comment
    #[arg(long)]
    repo_owner: Option<String>,
    /// Repository name for the pull request comment
    #[arg(long)]
    repo_name: Option<String>,
}

impl TargetArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            pr_number: self.pr,
            app_name: self.app,
            region: self.region,
            base_domain: self.domain,
            repo_owner: self.repo_owner,
            repo_name: self.repo_name,
            ..Default::default()
        }
    }
}

fn notifier(token: Option<String>) -> Arc<dyn Notifier> {
    match token.filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(GitHubNotifier::new(token)),
        None => Arc::new(DisabledNotifier),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config,
        github_token,
        command,
    } = cli;

    match command {
        Commands::Deploy {
            target,
            source,
            cert,
        } => {
            let overrides = Overrides {
                source_dir: source,
                certificate_arn: cert,
                ..target.into_overrides()
            };
            let settings = Settings::load(config.as_deref(), &overrides)?;
            let request = settings.deploy_request()?;
            let wait = settings.wait_policy()?;

            let aws = AwsClients::load(&settings.region).await;
            let controller = EnvironmentController::new(
                Arc::new(aws.storage),
                Arc::new(aws.cdn),
                Arc::new(aws.dns),
                notifier(github_token),
                wait,
            );

            let report = controller.deploy(&request).await?;
            info!(
                "Deployed {} files to distribution {}",
                report.files_uploaded, report.distribution_id
            );

            println!("\n✓ Preview environment deployed successfully!");
            println!("URL: {}", report.url);
            println!("\nNote: CloudFront distribution may take 3-5 minutes to fully propagate.");
        }
        Commands::Cleanup { target } => {
            let settings = Settings::load(config.as_deref(), &target.into_overrides())?;
            let request = settings.cleanup_request()?;
            let wait = settings.wait_policy()?;

            let aws = AwsClients::load(&settings.region).await;
            let controller = EnvironmentController::new(
                Arc::new(aws.storage),
                Arc::new(aws.cdn),
                Arc::new(aws.dns),
                notifier(github_token),
                wait,
            );

            let report = controller.cleanup(&request).await?;

            println!("\n✓ Cleanup completed successfully");
            println!("Removed preview environment {}", report.hostname);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Cli::parse()).await {
        if let Some(step) = e.downcast_ref::<PreviewError>().and_then(PreviewError::step) {
            tracing::debug!("Run stopped during step: {}", step);
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
