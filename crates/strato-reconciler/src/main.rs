//! strato: reconcile compute-instance specs against an EC2-compatible
//! endpoint.
//!
//! A thin operator front end over the reconciler library. Desired specs and
//! tracked state travel as JSON documents on disk, one file per instance.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use strato_compute::CloudClient;
use strato_reconciler::config::ProviderSettings;
use strato_reconciler::model::{DesiredSpec, TrackedState};
use strato_reconciler::reconciler::InstanceReconciler;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "strato")]
#[command(about = "Reconcile compute instances against an EC2-compatible endpoint")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ProviderArgs {
    /// Compute API endpoint URL
    #[arg(long, env = "AWS_ENDPOINT")]
    endpoint: Option<String>,

    /// Access key id
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key: Option<String>,

    /// Secret access key
    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Region name (deployment default when omitted)
    #[arg(long)]
    region: Option<String>,

    /// Skip TLS certificate verification (self-hosted deployments only)
    #[arg(long)]
    insecure_skip_tls: bool,
}

impl From<ProviderArgs> for ProviderSettings {
    fn from(args: ProviderArgs) -> Self {
        Self {
            endpoint: args.endpoint,
            access_key: args.access_key,
            secret_key: args.secret_key,
            region: args.region,
            insecure_skip_tls: args.insecure_skip_tls,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an instance from a desired-spec document
    Create {
        /// Path to the desired spec (JSON)
        #[arg(long)]
        spec: PathBuf,
        /// Where to write the tracked state (JSON)
        #[arg(long)]
        state: PathBuf,
    },

    /// Refresh tracked state from the remote system
    Read {
        /// Tracked-state file to refresh in place
        #[arg(long)]
        state: PathBuf,
    },

    /// Persist a new desired spec over existing tracked state
    Update {
        /// Path to the desired spec (JSON)
        #[arg(long)]
        spec: PathBuf,
        /// Tracked-state file to overwrite
        #[arg(long)]
        state: PathBuf,
    },

    /// Terminate the tracked instance and drop its state file
    Delete {
        /// Tracked-state file of the instance to terminate
        #[arg(long)]
        state: PathBuf,
    },

    /// Seed tracked state from a bare instance id and refresh it
    Import {
        /// Remote instance id, e.g. i-abc123
        #[arg(long)]
        id: String,
        /// Where to write the tracked state (JSON)
        #[arg(long)]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print the error and its cause chain.
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "\x1b[1;31mError:\x1b[0m {e}");
    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let settings = ProviderSettings::from(cli.provider)
        .resolve()
        .context("incomplete provider settings")?;
    let cloud = CloudClient::connect(settings)
        .await
        .context("failed to build the compute connection")?;
    let reconciler = InstanceReconciler::new(cloud);

    // One cancellation signal per invocation, wired to ctrl-c.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Create { spec, state } => {
            let desired = read_spec(&spec)?;
            let tracked = reconciler.create(desired, &cancel).await?;
            info!(instance_id = %tracked.id, "instance created");
            write_state(&state, &tracked)
        }

        Command::Read { state } => {
            let tracked = read_state(&state)?;
            match reconciler.read(tracked, &cancel).await? {
                Some(refreshed) => {
                    info!(instance_id = %refreshed.id, state = ?refreshed.state, "state refreshed");
                    write_state(&state, &refreshed)
                }
                None => {
                    info!("instance no longer exists; dropping it from tracking");
                    drop_state(&state)
                }
            }
        }

        Command::Update { spec, state } => {
            let desired = read_spec(&spec)?;
            let prior = read_state(&state)?;
            let tracked = reconciler.update(&prior, desired).await?;
            write_state(&state, &tracked)
        }

        Command::Delete { state } => {
            let tracked = read_state(&state)?;
            reconciler.delete(&tracked.id, &cancel).await?;
            info!(instance_id = %tracked.id, "instance deleted");
            drop_state(&state)
        }

        Command::Import { id, state } => {
            let seed = reconciler.import(id.clone());
            match reconciler.read(seed, &cancel).await? {
                Some(tracked) => {
                    info!(instance_id = %tracked.id, "instance imported");
                    write_state(&state, &tracked)
                }
                None => anyhow::bail!("instance {id} does not exist on the remote system"),
            }
        }
    }
}

fn read_spec(path: &Path) -> Result<DesiredSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse spec file {}", path.display()))
}

fn read_state(path: &Path) -> Result<TrackedState> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse state file {}", path.display()))
}

fn write_state(path: &Path, state: &TrackedState) -> Result<()> {
    let rendered = serde_json::to_string_pretty(state)?;
    std::fs::write(path, rendered)
        .with_context(|| format!("failed to write state file {}", path.display()))
}

fn drop_state(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove state file {}", path.display()))?;
    }
    Ok(())
}
