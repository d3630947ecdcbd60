//! One complete provisioning run.
//!
//! Stages run in a fixed order: credentials and images are resolved first,
//! then addresses are allocated, supporting resources are created, and the
//! nodes are launched seeds first. Any failure after that point is handed to
//! [`rollback`] before it is returned.

use rand::Rng;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::allocator::AddressAllocator;
use crate::boot::{generate_password, BootConfig, PASSWORD_LENGTH};
use crate::config::{ClusterConfig, DEFAULT_REGISTRY_HOST};
use crate::error::{ProvisionError, Result};
use crate::launcher::{LaunchPlan, LaunchSequencer};
use crate::ledger::{rollback, Ledger};
use crate::provider::{ArtifactResolver, CertificateIssuer, CloudProvider};
use crate::provisioners::{
    ensure_instance_profile, find_machine_images, resolve_docker_image, setup_access_groups,
    setup_alarm_topics, setup_dns_records,
};
use crate::report::ProvisionReport;
use crate::seeds::{announce_seed_nodes, pick_seed_nodes};
use crate::types::Topology;

pub struct Orchestrator<'a, P: ?Sized> {
    provider: &'a P,
    artifacts: &'a dyn ArtifactResolver,
    certificates: &'a dyn CertificateIssuer,
    registry_host: String,
    cancel: CancellationToken,
}

impl<'a, P> Orchestrator<'a, P>
where
    P: CloudProvider + ?Sized,
{
    pub fn new(
        provider: &'a P,
        artifacts: &'a dyn ArtifactResolver,
        certificates: &'a dyn CertificateIssuer,
    ) -> Self {
        Self {
            provider,
            artifacts,
            certificates,
            registry_host: DEFAULT_REGISTRY_HOST.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Host prefixed to artifact image references
    pub fn with_registry_host(mut self, host: impl Into<String>) -> Self {
        self.registry_host = host.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Provision the cluster described by `config`. On failure every
    /// recorded resource is compensated and the original error returned.
    pub async fn run<R>(&self, config: &ClusterConfig, rng: &mut R) -> Result<ProvisionReport>
    where
        R: Rng + ?Sized,
    {
        let admin_password = generate_password(rng, PASSWORD_LENGTH);
        let mut ledger = Ledger::new();

        match self.provision(config, admin_password, &mut ledger).await {
            Ok(report) => {
                info!("Cluster initialization completed successfully!");
                Ok(report)
            }
            Err(error) => Err(rollback(self.provider, &ledger, error).await),
        }
    }

    async fn provision(
        &self,
        config: &ClusterConfig,
        admin_password: String,
        ledger: &mut Ledger,
    ) -> Result<ProvisionReport> {
        let cluster_name = config.cluster_name();
        let regions = config.regions();

        // nothing below creates resources until allocation starts
        info!("Generating TLS key material for {}..", cluster_name);
        let keys = self.certificates.issue(cluster_name)?;
        let image =
            resolve_docker_image(self.artifacts, config.image_source(), &self.registry_host)
                .await?;
        let images =
            find_machine_images(self.provider, regions, &config.machine_image_pattern).await?;

        let mut subnets = BTreeMap::new();
        for region in regions {
            info!("Checking {} subnets in {}..", config.subnet_type(), region);
            let found = self
                .provider
                .enumerate_subnets(region, config.subnet_prefix())
                .await?;
            if found.is_empty() {
                return Err(ProvisionError::resolution(
                    format!("{} subnets", config.subnet_type()),
                    region,
                ));
            }
            subnets.insert(region.clone(), found);
        }

        // topology keeps the configured region order
        let mut allocator = AddressAllocator::new(config.allocation_plan());
        let mut topology = Topology::new();
        for region in regions {
            let region_subnets = subnets
                .get(region)
                .ok_or_else(|| ProvisionError::resolution("subnets", region))?;
            let nodes = allocator
                .allocate_region(self.provider, region, region_subnets, ledger)
                .await?;
            topology.insert(region.clone(), nodes);
        }

        let alarm_topics = match &config.alarms {
            Some(settings) => {
                setup_alarm_topics(self.provider, cluster_name, regions, settings).await?
            }
            None => BTreeMap::new(),
        };

        if let Some(zone) = config.hosted_zone() {
            setup_dns_records(self.provider, cluster_name, zone, &topology).await?;
        }

        let groups = setup_access_groups(
            self.provider,
            cluster_name,
            config.public_facing(),
            &topology,
            ledger,
        )
        .await?;

        let seeds = pick_seed_nodes(&topology, config.seed_count());
        announce_seed_nodes(&seeds);

        let boot = BootConfig::for_cluster(config, &image, &seeds, &keys, admin_password.clone());
        let profile = ensure_instance_profile(self.provider, cluster_name).await?;

        let plan = LaunchPlan {
            cluster_name: cluster_name.to_string(),
            instance_type: config.instance_type.clone(),
            volume: config.volume.clone(),
            termination_protection: config.termination_protection,
            public_facing: config.public_facing(),
            seed_count: config.seed_count(),
            timing: config.timing(),
            images,
            subnets,
            groups,
            alarm_topics,
            profile,
            boot,
        };

        let mut sequencer = LaunchSequencer::new(self.provider, &plan, self.cancel.clone());
        sequencer.launch_seed_nodes(&seeds).await?;
        sequencer.launch_normal_nodes(&topology).await?;

        Ok(ProvisionReport {
            cluster_name: cluster_name.to_string(),
            cluster_size: config.cluster_size(),
            regions: regions.to_vec(),
            image,
            topology,
            seeds,
            nodes: sequencer.into_launched(),
            admin_password,
        })
    }
}
