use anyhow::{Context, Result};
use clap::Args;
use planb_orchestrator::ClusterConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from `config.toml`; command line values take precedence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub gateway: GatewaySection,
    pub registry: RegistrySection,
    pub cluster: ClusterSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub url: Option<String>,
}

/// Defaults for `planb create`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    pub regions: Vec<String>,
    pub cluster_size: Option<usize>,
    pub dmz: bool,
    pub num_tokens: Option<u32>,
    pub instance_type: Option<String>,
    pub volume_type: Option<String>,
    pub volume_size: Option<u32>,
    pub volume_iops: Option<u32>,
    pub hosted_zone: Option<String>,
    pub sns_topic: Option<String>,
    pub sns_email: Option<String>,
    pub scalyr_key: Option<String>,
    pub artifact_name: Option<String>,
    pub docker_image: Option<String>,
    pub environment: Vec<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let cfg = toml::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(cfg)
    }
}

pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("planb");
    dir.push("config.toml");
    dir
}

pub const DEFAULT_CLUSTER_SIZE: usize = 3;

#[derive(Args, Debug, Clone, Default)]
pub struct CreateArgs {
    /// Name of the cluster, also used for security groups and volumes
    #[arg(long, env = "PLANB_CLUSTER_NAME")]
    pub cluster_name: String,

    /// Number of nodes per region
    #[arg(long)]
    pub cluster_size: Option<usize>,

    /// Region to deploy to (repeat for multi-region clusters)
    #[arg(long = "region")]
    pub regions: Vec<String>,

    /// Place nodes in DMZ subnets with public addresses
    #[arg(long, overrides_with = "no_dmz")]
    pub dmz: bool,

    /// Place nodes in internal subnets, even if the config file says dmz
    #[arg(long, overrides_with = "dmz")]
    pub no_dmz: bool,

    #[arg(long)]
    pub num_tokens: Option<u32>,

    #[arg(long)]
    pub instance_type: Option<String>,

    /// Data volume type (gp2, io1, ...)
    #[arg(long)]
    pub volume_type: Option<String>,

    /// Data volume size in GiB
    #[arg(long)]
    pub volume_size: Option<u32>,

    /// Provisioned IOPS, only used with io1 volumes
    #[arg(long)]
    pub volume_iops: Option<u32>,

    /// DNS zone for the cluster's SRV records
    #[arg(long)]
    pub hosted_zone: Option<String>,

    /// Alarm topic name
    #[arg(long)]
    pub sns_topic: Option<String>,

    /// Email subscribed to the alarm topic
    #[arg(long)]
    pub sns_email: Option<String>,

    /// Log shipping account key
    #[arg(long, env = "PLANB_SCALYR_KEY")]
    pub scalyr_key: Option<String>,

    /// Artifact whose latest tag should be deployed
    #[arg(long)]
    pub artifact_name: Option<String>,

    /// Exact docker image to deploy
    #[arg(long)]
    pub docker_image: Option<String>,

    /// Extra KEY=VALUE passed to the nodes (repeatable)
    #[arg(long, short = 'e')]
    pub environment: Vec<String>,

    #[arg(long)]
    pub no_termination_protection: bool,

    /// Rehearse against an in-memory cloud without touching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Cloud gateway base URL
    #[arg(long, env = "PLANB_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Bearer token for the cloud gateway
    #[arg(long, env = "PLANB_GATEWAY_TOKEN", hide_env_values = true)]
    pub gateway_token: Option<String>,

    /// Artifact registry base URL
    #[arg(long, env = "PLANB_REGISTRY_URL")]
    pub registry_url: Option<String>,
}

impl CreateArgs {
    /// `Some` only when the command line picked a subnet kind
    pub fn dmz_override(&self) -> Option<bool> {
        match (self.dmz, self.no_dmz) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

/// Merge command line and file settings into the cluster description
pub fn cluster_config(args: &CreateArgs, file: &FileConfig) -> Result<ClusterConfig> {
    let defaults = &file.cluster;
    let regions = if args.regions.is_empty() {
        &defaults.regions
    } else {
        &args.regions
    };

    let mut builder = ClusterConfig::builder()
        .cluster_name(args.cluster_name.as_str())
        .cluster_size(
            args.cluster_size
                .or(defaults.cluster_size)
                .unwrap_or(DEFAULT_CLUSTER_SIZE),
        )
        .regions(regions.iter().map(String::as_str))
        .public_facing(args.dmz_override().unwrap_or(defaults.dmz))
        .hosted_zone(args.hosted_zone.clone().or_else(|| defaults.hosted_zone.clone()))
        .alarm_topic(args.sns_topic.clone().or_else(|| defaults.sns_topic.clone()))
        .alarm_email(args.sns_email.clone().or_else(|| defaults.sns_email.clone()))
        .scalyr_key(args.scalyr_key.clone().or_else(|| defaults.scalyr_key.clone()))
        .artifact_name(args.artifact_name.clone().or_else(|| defaults.artifact_name.clone()))
        .docker_image(args.docker_image.clone().or_else(|| defaults.docker_image.clone()))
        .no_termination_protection(args.no_termination_protection);

    if let Some(tokens) = args.num_tokens.or(defaults.num_tokens) {
        builder = builder.num_tokens(tokens);
    }
    if let Some(instance_type) = args.instance_type.as_ref().or(defaults.instance_type.as_ref()) {
        builder = builder.instance_type(instance_type.as_str());
    }
    if let Some(volume_type) = args.volume_type.as_ref().or(defaults.volume_type.as_ref()) {
        builder = builder.volume_type(volume_type.as_str());
    }
    if let Some(size) = args.volume_size.or(defaults.volume_size) {
        builder = builder.volume_size(size);
    }
    if let Some(iops) = args.volume_iops.or(defaults.volume_iops) {
        builder = builder.volume_iops(iops);
    }
    // file entries first so the command line wins on duplicate keys
    for pair in defaults.environment.iter().chain(&args.environment) {
        builder = builder.environment(pair.as_str());
    }

    let config = builder.build()?;
    Ok(config)
}
