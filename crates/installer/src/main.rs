//! Trainstack CLI - provision the GPU training stack and deploy the workload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trainstack_cloud::Aws;
use trainstack_installer::{Stack, StackConfig};

/// Trainstack CLI - Provision a GPU-capable cluster and its training workload.
#[derive(Parser)]
#[command(name = "trainstack")]
#[command(about = "Provision a GPU training stack on AWS")]
struct Cli {
    /// AWS access key ID (or set `AWS_ACCESS_KEY_ID` env var).
    #[arg(long, env = "AWS_ACCESS_KEY_ID", default_value = "")]
    access_key_id: String,

    /// AWS secret access key (or set `AWS_SECRET_ACCESS_KEY` env var).
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", default_value = "")]
    secret_access_key: String,

    /// Service role ARN used for cluster creation.
    #[arg(long, env = "TRAINSTACK_CLUSTER_ROLE_ARN", default_value = "")]
    cluster_role_arn: String,

    /// Path to the stack configuration file.
    #[arg(long, env = "TRAINSTACK_CONFIG", default_value = "trainstack.toml")]
    config: PathBuf,

    /// Workload image reference, overriding the configuration file.
    #[arg(long)]
    image: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the full stack and deploy the workload.
    Provision,

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if cli.config.exists() {
        StackConfig::load(&cli.config)?
    } else {
        info!(
            path = %cli.config.display(),
            "No configuration file found, using defaults"
        );
        StackConfig::default()
    };
    if let Some(image) = cli.image {
        config.workload.image = image;
    }

    match cli.command {
        Commands::Provision => {
            if config.workload.image.is_empty() {
                anyhow::bail!(
                    "no workload image configured; set [workload].image or pass --image"
                );
            }

            let mut aws = Aws::new(
                cli.access_key_id,
                cli.secret_access_key,
                config.region.clone(),
            )
            .context("Failed to build AWS client")?;
            if !cli.cluster_role_arn.is_empty() {
                aws = aws.with_cluster_role(cli.cluster_role_arn);
            }

            let stack = Stack::new(std::sync::Arc::new(aws), config);
            let outputs = stack.run().await?;

            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
