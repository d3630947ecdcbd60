use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use planb_cli::certs::SelfSignedIssuer;
use planb_cli::config::{cluster_config, default_config_path, CreateArgs, FileConfig};
use planb_cli::gateway::CloudGateway;
use planb_cli::http_client::HttpClient;
use planb_cli::registry::{RegistryClient, DEFAULT_REGISTRY_URL};
use planb_cli::rehearsal::dry_run;
use planb_orchestrator::{failure_notice, ClusterConfig, Orchestrator, ProvisionReport};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "planb")]
#[command(about = "Provision multi-region Plan B Cassandra clusters", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Config file (defaults to <config dir>/planb/config.toml)
    #[arg(long, env = "PLANB_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new cluster
    Create(CreateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.unwrap_or_else(default_config_path);
    let file = FileConfig::load(&config_path)?;

    match args.command {
        Command::Create(create) => create_cluster(create, &file).await,
    }
}

async fn create_cluster(args: CreateArgs, file: &FileConfig) -> Result<()> {
    let config = cluster_config(&args, file)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling provisioning..");
                cancel.cancel();
            }
        }
    });

    let result = if args.dry_run {
        dry_run(&config, cancel).await
    } else {
        provision(&args, file, &config, cancel).await?
    };

    match result {
        Ok(report) => {
            print!("{}", report);
            Ok(())
        }
        Err(e) => {
            eprint!("{}", failure_notice());
            Err(e).context("Cluster provisioning failed")
        }
    }
}

async fn provision(
    args: &CreateArgs,
    file: &FileConfig,
    config: &ClusterConfig,
    cancel: CancellationToken,
) -> Result<planb_orchestrator::Result<ProvisionReport>> {
    let timeout = Duration::from_secs(file.gateway.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

    let gateway_url = args
        .gateway_url
        .as_deref()
        .or(file.gateway.url.as_deref())
        .context("No cloud gateway configured: pass --gateway-url or set [gateway] url")?;
    let token = args.gateway_token.clone().or_else(|| file.gateway.token.clone());
    let gateway = CloudGateway::new(HttpClient::new(gateway_url, token, timeout)?);

    let registry_url = args
        .registry_url
        .as_deref()
        .or(file.registry.url.as_deref())
        .unwrap_or(DEFAULT_REGISTRY_URL);
    let registry = RegistryClient::new(registry_url, timeout)?;
    let issuer = SelfSignedIssuer::default();

    info!(
        "Creating cluster {} in {} region(s) via {}",
        config.cluster_name(),
        config.regions().len(),
        gateway_url
    );

    let mut rng = StdRng::from_entropy();
    Ok(Orchestrator::new(&gateway, &registry, &issuer)
        .with_registry_host(registry.host())
        .with_cancellation(cancel)
        .run(config, &mut rng)
        .await)
}
