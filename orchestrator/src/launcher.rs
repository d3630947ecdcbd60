//! Launch sequencing: seeds first, then normal nodes, paced.

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::boot::BootConfig;
use crate::config::{Timing, VolumeSettings};
use crate::error::{ProvisionError, Result};
use crate::provider::{Compute, Monitoring};
use crate::types::{
    AccessGroupHandle, AlarmTopicHandle, ImageHandle, InstanceId, InstanceSpec, InstanceState,
    NodeAddress, ProfileHandle, Region, Subnet, Tag, Topology,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Seed,
    Normal,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Seed => f.write_str("SEED"),
            NodeRole::Normal => f.write_str("NORMAL"),
        }
    }
}

/// Everything resolved before the first instance is requested
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub cluster_name: String,
    pub instance_type: String,
    pub volume: VolumeSettings,
    pub termination_protection: bool,
    pub public_facing: bool,
    pub seed_count: usize,
    pub timing: Timing,
    pub images: BTreeMap<Region, ImageHandle>,
    pub subnets: BTreeMap<Region, Vec<Subnet>>,
    pub groups: BTreeMap<Region, AccessGroupHandle>,
    pub alarm_topics: BTreeMap<Region, AlarmTopicHandle>,
    pub profile: ProfileHandle,
    pub boot: BootConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedNode {
    pub region: Region,
    pub private_ip: Ipv4Addr,
    pub instance: InstanceId,
    pub role: NodeRole,
    pub state: InstanceState,
}

fn lookup<'a, T>(map: &'a BTreeMap<Region, T>, region: &Region, what: &str) -> Result<&'a T> {
    map.get(region)
        .ok_or_else(|| ProvisionError::resolution(what, region))
}

pub struct LaunchSequencer<'a, P: ?Sized> {
    provider: &'a P,
    plan: &'a LaunchPlan,
    cancel: CancellationToken,
    launched: Vec<LaunchedNode>,
}

impl<'a, P> LaunchSequencer<'a, P>
where
    P: Compute + Monitoring + ?Sized,
{
    pub fn new(provider: &'a P, plan: &'a LaunchPlan, cancel: CancellationToken) -> Self {
        Self {
            provider,
            plan,
            cancel,
            launched: Vec::new(),
        }
    }

    pub fn launched(&self) -> &[LaunchedNode] {
        &self.launched
    }

    pub fn into_launched(self) -> Vec<LaunchedNode> {
        self.launched
    }

    /// Launch every seed of every region, one at a time, pausing between
    /// consecutive seeds so the cluster does not bootstrap split views of
    /// its membership.
    pub async fn launch_seed_nodes(&mut self, seeds: &Topology) -> Result<()> {
        let total = seeds.all_nodes().count();
        let mut launched = 0;

        for (region, nodes) in seeds.iter() {
            for (i, node) in nodes.iter().enumerate() {
                self.launch_instance(region, i, node, NodeRole::Seed).await?;
                launched += 1;
                if launched < total {
                    info!("Sleeping for a minute before launching next SEED node..");
                    self.pause(self.plan.timing.seed_pacing).await?;
                }
            }
        }

        Ok(())
    }

    /// Launch the remaining nodes, pausing before each one so they do not
    /// all join at once.
    pub async fn launch_normal_nodes(&mut self, topology: &Topology) -> Result<()> {
        for (region, nodes) in topology.iter() {
            for (i, node) in nodes.iter().enumerate().skip(self.plan.seed_count) {
                info!("Sleeping for one minute before launching next node..");
                self.pause(self.plan.timing.node_pacing).await?;
                self.launch_instance(region, i, node, NodeRole::Normal).await?;
            }
        }

        Ok(())
    }

    async fn launch_instance(
        &mut self,
        region: &Region,
        index: usize,
        node: &NodeAddress,
        role: NodeRole,
    ) -> Result<()> {
        let plan = self.plan;
        let subnets = lookup(&plan.subnets, region, "subnets")?;
        if subnets.is_empty() {
            return Err(ProvisionError::resolution("subnets", region));
        }
        let subnet = &subnets[index % subnets.len()];

        info!("Launching {} node {} in {}..", role, node.default_ip(), region);

        let volume_name = format!("{}-{}", plan.cluster_name, node.private_ip);
        let volume = self
            .provider
            .create_volume(
                region,
                &subnet.availability_zone,
                &plan.volume.spec(volume_name.clone()),
            )
            .await?;
        self.provider
            .tag_resource(
                region,
                &volume.0,
                &[
                    Tag::new("Name", volume_name.as_str()),
                    Tag::new("Taupage:erase-on-boot", "True"),
                ],
            )
            .await?;

        let user_data = plan.boot.with_data_volume(&volume_name).render()?;
        let spec = InstanceSpec {
            image: lookup(&plan.images, region, "machine image")?.clone(),
            instance_type: plan.instance_type.clone(),
            subnet_id: subnet.subnet_id.clone(),
            private_ip: node.private_ip,
            access_group: lookup(&plan.groups, region, "security group")?.clone(),
            profile: plan.profile.clone(),
            user_data,
            termination_protection: plan.termination_protection,
        };

        let instance = self.provider.create_instance(region, &spec).await?;
        self.provider
            .tag_resource(region, &instance.0, &[Tag::new("Name", plan.cluster_name.as_str())])
            .await?;

        // the public address can only be attached once the instance is out
        // of pending
        let state = self.wait_until_initialized(region, &instance).await?;
        if state != InstanceState::Running {
            warn!("Instance {} in {} left pending as {:?}", instance, region, state);
        }

        if plan.public_facing {
            match &node.allocation {
                Some(allocation) => {
                    self.provider
                        .associate_public_address(region, &instance, allocation)
                        .await?
                }
                None => warn!("No public address allocated for {}", node.private_ip),
            }
        }

        if let Some(topic) = plan.alarm_topics.get(region) {
            self.provider
                .create_recovery_alarm(region, &plan.cluster_name, &instance, topic)
                .await?;
        }

        self.launched.push(LaunchedNode {
            region: region.clone(),
            private_ip: node.private_ip,
            instance,
            role,
            state,
        });

        Ok(())
    }

    /// Poll until the instance leaves pending. There is no deadline; the
    /// cancellation token is the only way out of a stuck wait.
    async fn wait_until_initialized(
        &self,
        region: &Region,
        instance: &InstanceId,
    ) -> Result<InstanceState> {
        loop {
            let state = self.provider.get_instance_state(region, instance).await?;
            if !state.is_pending() {
                return Ok(state);
            }
            debug!("Instance {} is still pending", instance);
            self.pause(self.plan.timing.poll_interval).await?;
        }
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
