//! chosdeploy: provision or tear down unattended CopperheadOS build
//! infrastructure on AWS.

use anyhow::{Context, Result};
use chos_common::defaults::{
    DEFAULT_AMI, DEFAULT_SPOT_PRICE, DEFAULT_TERRAFORM_BASE_URL, DEFAULT_TERRAFORM_VERSION,
};
use chos_common::{Device, RunConfig, ToolRelease};
use chos_deploy::aws::{AwsContext, S3BucketStore, verify_credentials};
use chos_deploy::{
    AwsConfig, DeployConfig, DeployError, Deployer, RuntimeFlags, StdoutSink, ToolSource,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "chosdeploy")]
#[command(about = "Provision AWS infrastructure for unattended CopperheadOS builds")]
#[command(version)]
struct Args {
    /// Name for this deployment; prefixes every AWS resource and must be
    /// globally unique as an S3 bucket name
    #[arg(short, long)]
    name: String,

    /// AWS region to deploy into
    #[arg(short, long)]
    region: String,

    /// Device to build for
    #[arg(short, long, value_parser = parse_device)]
    device: Device,

    /// EC2 key pair to attach to the build instance
    #[arg(long)]
    ssh_key: Option<String>,

    /// Maximum spot price (USD/hour)
    #[arg(long, default_value = DEFAULT_SPOT_PRICE)]
    spot_price: String,

    /// AMI for the build instance
    #[arg(long, default_value = DEFAULT_AMI)]
    ami: String,

    /// Remove all AWS infrastructure for this deployment
    #[arg(long)]
    remove: bool,

    /// Leave the build instance running after the build
    #[arg(long)]
    prevent_shutdown: bool,

    /// Keep the local workspace after a successful apply
    #[arg(long)]
    keep_workspace: bool,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Terraform release to download
    #[arg(long, env = "CHOS_TERRAFORM_VERSION", default_value = DEFAULT_TERRAFORM_VERSION)]
    terraform_version: String,

    /// Release root the Terraform archive is fetched from
    #[arg(long, env = "CHOS_TERRAFORM_BASE_URL", default_value = DEFAULT_TERRAFORM_BASE_URL)]
    terraform_base_url: String,

    /// Use a local terraform binary instead of downloading one
    #[arg(long, env = "CHOS_TERRAFORM_BIN")]
    terraform_bin: Option<PathBuf>,
}

fn parse_device(s: &str) -> std::result::Result<Device, String> {
    s.parse().map_err(|_| {
        format!(
            "unknown device '{s}' (expected one of: {})",
            Device::names().join(", ")
        )
    })
}

impl From<Args> for DeployConfig {
    fn from(args: Args) -> Self {
        let mut run = RunConfig::new(args.name, args.region, args.device)
            .with_ami(args.ami)
            .with_spot_price(args.spot_price)
            .with_prevent_shutdown(args.prevent_shutdown);
        if let Some(key) = args.ssh_key {
            run = run.with_ssh_key(key);
        }

        let tool = match args.terraform_bin {
            Some(path) => ToolSource::Local(path),
            None => ToolSource::Download(ToolRelease::new(
                args.terraform_version,
                args.terraform_base_url,
            )),
        };

        Self {
            run,
            tool,
            aws: AwsConfig {
                aws_profile: args.aws_profile,
            },
            flags: RuntimeFlags {
                remove: args.remove,
                keep_workspace: args.keep_workspace,
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(exit_code(&e));
    }
}

/// The provisioning tool's own exit code when it failed, otherwise 1
fn exit_code(e: &anyhow::Error) -> i32 {
    e.downcast_ref::<DeployError>()
        .and_then(DeployError::exit_code)
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if let Some(hint) = e.downcast_ref::<DeployError>().and_then(DeployError::suggestion) {
        let _ = writeln!(stderr, "\n\x1b[36mHint:\x1b[0m {hint}");
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config: DeployConfig = args.into();
    config.validate()?;

    if let Some(profile) = &config.aws.aws_profile {
        info!(profile = %profile, "Using AWS profile");
    }

    let aws = AwsContext::with_profile(&config.run.region, config.aws.aws_profile.as_deref()).await;
    verify_credentials(&aws).await?;

    info!(
        name = %config.run.name,
        region = %config.run.region,
        device = %config.run.device,
        remove = config.flags.remove,
        "Starting deployment"
    );

    let remove = config.flags.remove;
    let deployer = Deployer::new(config, Arc::new(StdoutSink));

    if remove {
        let workspace = deployer.destroy().await?;
        info!(workspace = %workspace.display(), "Infrastructure removed");
    } else {
        let store = S3BucketStore::from_context(&aws);
        if let Some(workspace) = deployer
            .apply(&store)
            .await
            .context("Deployment failed")?
        {
            println!("Workspace kept at {}", workspace.display());
        }
    }

    Ok(())
}
