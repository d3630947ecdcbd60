use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::error::{ProvisionError, Result};
use crate::types::{Region, VolumeSpec};

pub const DEFAULT_ARTIFACT: &str = "planb-cassandra-3.0";
pub const DEFAULT_REGISTRY_HOST: &str = "registry.opensource.zalan.do";
pub const DEFAULT_MACHINE_IMAGE_PATTERN: &str = "*Taupage-AMI-*";
pub const DEFAULT_RESERVED_ADDRESSES: usize = 10;
pub const MAX_SEED_COUNT: usize = 3;

/// Inter-node (gossip) port of the database
pub const INTER_NODE_PORT: u16 = 7001;
/// Client protocol port of the database
pub const CLIENT_PORT: u16 = 9042;
pub const SSH_PORT: u16 = 22;

/// Where the node container image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Fully qualified image reference, version after the last `:`
    DockerImage(String),
    /// Artifact name whose latest tag is looked up in the registry
    Artifact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSettings {
    pub volume_type: String,
    pub size_gb: u32,
    pub iops: u32,
}

impl VolumeSettings {
    pub fn spec(&self, name: String) -> VolumeSpec {
        VolumeSpec {
            name,
            volume_type: self.volume_type.clone(),
            size_gb: self.size_gb,
            // provisioned IOPS only apply to io1 volumes
            iops: (self.volume_type == "io1").then_some(self.iops),
            encrypted: false,
        }
    }
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            volume_type: "gp2".to_string(),
            size_gb: 16,
            iops: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSettings {
    pub topic: Option<String>,
    pub email: Option<String>,
}

impl AlarmSettings {
    pub fn topic_name<'a>(&'a self, cluster_name: &'a str) -> &'a str {
        self.topic.as_deref().unwrap_or(cluster_name)
    }
}

/// Pacing and polling intervals of the launch sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Delay between consecutive seed launches
    pub seed_pacing: Duration,
    /// Delay before every normal node launch
    pub node_pacing: Duration,
    /// Instance state poll interval while it is pending
    pub poll_interval: Duration,
}

impl Timing {
    /// No pacing at all, for rehearsals against a simulated cloud
    pub fn immediate() -> Self {
        Self {
            seed_pacing: Duration::ZERO,
            node_pacing: Duration::ZERO,
            poll_interval: Duration::ZERO,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            seed_pacing: Duration::from_secs(60),
            node_pacing: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// What the address allocator needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPlan {
    pub count: usize,
    pub reserved: usize,
    pub public_facing: bool,
}

/// Immutable description of the cluster to provision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub(crate) cluster_name: String,
    pub(crate) cluster_size: usize,
    pub(crate) regions: Vec<Region>,
    pub(crate) public_facing: bool,
    pub(crate) num_tokens: u32,
    pub(crate) instance_type: String,
    pub(crate) volume: VolumeSettings,
    pub(crate) hosted_zone: Option<String>,
    pub(crate) alarms: Option<AlarmSettings>,
    pub(crate) image_source: ImageSource,
    pub(crate) environment: BTreeMap<String, String>,
    pub(crate) scalyr_key: Option<String>,
    pub(crate) termination_protection: bool,
    pub(crate) machine_image_pattern: String,
    pub(crate) reserved_addresses: usize,
    pub(crate) timing: Timing,
}

impl ClusterConfig {
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::default()
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn cluster_size(&self) -> usize {
        self.cluster_size
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn public_facing(&self) -> bool {
        self.public_facing
    }

    pub fn hosted_zone(&self) -> Option<&str> {
        self.hosted_zone.as_deref()
    }

    pub fn image_source(&self) -> &ImageSource {
        &self.image_source
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Up to 3 seed nodes per region
    pub fn seed_count(&self) -> usize {
        self.cluster_size.min(MAX_SEED_COUNT)
    }

    /// Name prefix of the subnets nodes are placed in
    pub fn subnet_prefix(&self) -> &'static str {
        if self.public_facing {
            "dmz-"
        } else {
            "internal-"
        }
    }

    pub fn subnet_type(&self) -> &'static str {
        if self.public_facing {
            "dmz"
        } else {
            "internal"
        }
    }

    pub fn allocation_plan(&self) -> AllocationPlan {
        AllocationPlan {
            count: self.cluster_size,
            reserved: self.reserved_addresses,
            public_facing: self.public_facing,
        }
    }

    /// Same configuration with different launch timing
    pub fn with_timing(&self, timing: Timing) -> Self {
        Self {
            timing,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterConfigBuilder {
    cluster_name: Option<String>,
    cluster_size: Option<usize>,
    regions: Vec<Region>,
    public_facing: bool,
    num_tokens: Option<u32>,
    instance_type: Option<String>,
    volume: VolumeSettings,
    hosted_zone: Option<String>,
    alarm_topic: Option<String>,
    alarm_email: Option<String>,
    docker_image: Option<String>,
    artifact_name: Option<String>,
    environment: Vec<String>,
    scalyr_key: Option<String>,
    no_termination_protection: bool,
    machine_image_pattern: Option<String>,
    reserved_addresses: Option<usize>,
    timing: Timing,
}

impl ClusterConfigBuilder {
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn cluster_size(mut self, size: usize) -> Self {
        self.cluster_size = Some(size);
        self
    }

    pub fn region(mut self, region: impl Into<Region>) -> Self {
        self.regions.push(region.into());
        self
    }

    pub fn regions<I, R>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Region>,
    {
        self.regions.extend(regions.into_iter().map(Into::into));
        self
    }

    pub fn public_facing(mut self, enabled: bool) -> Self {
        self.public_facing = enabled;
        self
    }

    pub fn num_tokens(mut self, tokens: u32) -> Self {
        self.num_tokens = Some(tokens);
        self
    }

    pub fn instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }

    pub fn volume_type(mut self, volume_type: impl Into<String>) -> Self {
        self.volume.volume_type = volume_type.into();
        self
    }

    pub fn volume_size(mut self, size_gb: u32) -> Self {
        self.volume.size_gb = size_gb;
        self
    }

    pub fn volume_iops(mut self, iops: u32) -> Self {
        self.volume.iops = iops;
        self
    }

    pub fn hosted_zone(mut self, zone: Option<String>) -> Self {
        self.hosted_zone = zone;
        self
    }

    pub fn alarm_topic(mut self, topic: Option<String>) -> Self {
        self.alarm_topic = topic;
        self
    }

    pub fn alarm_email(mut self, email: Option<String>) -> Self {
        self.alarm_email = email;
        self
    }

    pub fn docker_image(mut self, image: Option<String>) -> Self {
        self.docker_image = image;
        self
    }

    pub fn artifact_name(mut self, artifact: Option<String>) -> Self {
        self.artifact_name = artifact;
        self
    }

    /// Extra boot environment as `KEY=VALUE`
    pub fn environment(mut self, pair: impl Into<String>) -> Self {
        self.environment.push(pair.into());
        self
    }

    pub fn scalyr_key(mut self, key: Option<String>) -> Self {
        self.scalyr_key = key;
        self
    }

    pub fn no_termination_protection(mut self, disabled: bool) -> Self {
        self.no_termination_protection = disabled;
        self
    }

    pub fn machine_image_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.machine_image_pattern = Some(pattern.into());
        self
    }

    pub fn reserved_addresses(mut self, count: usize) -> Self {
        self.reserved_addresses = Some(count);
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn build(self) -> Result<ClusterConfig> {
        let cluster_name = self
            .cluster_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ProvisionError::InvalidConfiguration("cluster name is required".into()))?;

        let cluster_size = self.cluster_size.unwrap_or(0);
        if cluster_size == 0 {
            return Err(ProvisionError::InvalidConfiguration(
                "cluster size must be at least 1".into(),
            ));
        }

        if self.regions.is_empty() {
            return Err(ProvisionError::InvalidConfiguration(
                "at least one region is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region) {
                return Err(ProvisionError::InvalidConfiguration(format!(
                    "region {} given more than once",
                    region
                )));
            }
        }

        let image_source = match (self.docker_image, self.artifact_name) {
            (Some(_), Some(_)) => {
                return Err(ProvisionError::ConfigurationConflict(
                    "--artifact-name and --docker-image cannot be specified at the same time"
                        .into(),
                ))
            }
            (Some(image), None) => ImageSource::DockerImage(image),
            (None, Some(artifact)) => ImageSource::Artifact(artifact),
            (None, None) => ImageSource::Artifact(DEFAULT_ARTIFACT.to_string()),
        };

        let mut environment = BTreeMap::new();
        for pair in &self.environment {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ProvisionError::InvalidConfiguration(format!(
                    "environment entry {:?} is not KEY=VALUE",
                    pair
                ))
            })?;
            environment.insert(key.to_string(), value.to_string());
        }

        let alarms = match (self.alarm_topic, self.alarm_email) {
            (None, None) => None,
            (topic, email) => Some(AlarmSettings { topic, email }),
        };

        // managed zone names are fully qualified
        let hosted_zone = self.hosted_zone.map(|zone| {
            if zone.ends_with('.') {
                zone
            } else {
                format!("{}.", zone)
            }
        });

        Ok(ClusterConfig {
            cluster_name,
            cluster_size,
            regions: self.regions,
            public_facing: self.public_facing,
            num_tokens: self.num_tokens.unwrap_or(256),
            instance_type: self.instance_type.unwrap_or_else(|| "t2.medium".to_string()),
            volume: self.volume,
            hosted_zone,
            alarms,
            image_source,
            environment,
            scalyr_key: self.scalyr_key,
            termination_protection: !self.no_termination_protection,
            machine_image_pattern: self
                .machine_image_pattern
                .unwrap_or_else(|| DEFAULT_MACHINE_IMAGE_PATTERN.to_string()),
            reserved_addresses: self.reserved_addresses.unwrap_or(DEFAULT_RESERVED_ADDRESSES),
            timing: self.timing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ClusterConfigBuilder {
        ClusterConfig::builder()
            .cluster_name("orders")
            .cluster_size(5)
            .region("eu-central-1")
    }

    #[test]
    fn test_defaults() {
        let config = base().build().unwrap();

        assert_eq!(config.seed_count(), 3);
        assert_eq!(config.subnet_prefix(), "internal-");
        assert_eq!(config.reserved_addresses, 10);
        assert!(config.termination_protection);
        assert_eq!(
            config.image_source,
            ImageSource::Artifact(DEFAULT_ARTIFACT.to_string())
        );
        assert_eq!(config.timing, Timing::default());
    }

    #[test]
    fn test_seed_count_small_cluster() {
        let config = base().cluster_size(2).build().unwrap();
        assert_eq!(config.seed_count(), 2);
    }

    #[test]
    fn test_image_and_artifact_conflict() {
        let err = base()
            .docker_image(Some("registry/planb:3.0.1".into()))
            .artifact_name(Some("planb-cassandra-3.0".into()))
            .build()
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ConfigurationConflict(_)));
    }

    #[test]
    fn test_environment_pairs() {
        let config = base()
            .environment("HEAP=4G")
            .environment("JVM_OPTS=-Da=b=c")
            .build()
            .unwrap();

        assert_eq!(config.environment["HEAP"], "4G");
        assert_eq!(config.environment["JVM_OPTS"], "-Da=b=c");

        let err = base().environment("HEAP").build().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_regions() {
        let err = ClusterConfig::builder()
            .cluster_name("orders")
            .cluster_size(3)
            .build()
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfiguration(_)));

        let err = base().region("eu-central-1").build().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_rejects_zero_size() {
        let err = base().cluster_size(0).build().unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_hosted_zone_is_fully_qualified() {
        let config = base()
            .hosted_zone(Some("db.example.org".into()))
            .build()
            .unwrap();
        assert_eq!(config.hosted_zone(), Some("db.example.org."));
    }

    #[test]
    fn test_io1_volume_gets_iops() {
        let gp2 = VolumeSettings::default().spec("v".into());
        assert_eq!(gp2.iops, None);

        let io1 = VolumeSettings {
            volume_type: "io1".into(),
            size_gb: 100,
            iops: 3000,
        }
        .spec("v".into());
        assert_eq!(io1.iops, Some(3000));
    }

    #[test]
    fn test_alarm_topic_falls_back_to_cluster_name() {
        let config = base()
            .alarm_email(Some("ops@example.org".into()))
            .build()
            .unwrap();

        let alarms = config.alarms.as_ref().unwrap();
        assert_eq!(alarms.topic_name(config.cluster_name()), "orders");
    }
}
