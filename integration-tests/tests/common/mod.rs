pub mod fake_gateway;

use planb_orchestrator::sim::{Call, SimulatedCloud};
use planb_orchestrator::{ClusterConfig, Orchestrator, ProvisionReport, Region, Result, Timing};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;

pub fn regions(names: &[&str]) -> Vec<Region> {
    names.iter().map(|n| Region::from(*n)).collect()
}

pub fn two_regions() -> Vec<Region> {
    regions(&["eu-west-1", "eu-central-1"])
}

/// Zero-delay config for `size` nodes in each of `regions`
pub fn config(regions: &[Region], size: usize, public: bool) -> ClusterConfig {
    ClusterConfig::builder()
        .cluster_name("orders")
        .cluster_size(size)
        .regions(regions.to_vec())
        .public_facing(public)
        .timing(Timing::immediate())
        .build()
        .expect("valid test config")
}

/// Run the orchestrator with the simulated cloud as every collaborator
pub async fn provision(cloud: &SimulatedCloud, config: &ClusterConfig) -> Result<ProvisionReport> {
    provision_with_cancel(cloud, config, CancellationToken::new()).await
}

pub async fn provision_with_cancel(
    cloud: &SimulatedCloud,
    config: &ClusterConfig,
    cancel: CancellationToken,
) -> Result<ProvisionReport> {
    let mut rng = StdRng::seed_from_u64(7);
    Orchestrator::new(cloud, cloud, cloud)
        .with_cancellation(cancel)
        .run(config, &mut rng)
        .await
}

/// Private address of every instance-creation request, in call order
pub fn launch_order(cloud: &SimulatedCloud) -> Vec<Ipv4Addr> {
    cloud.launched().into_iter().map(|(_, ip)| ip).collect()
}

/// Position of the first call matching `pred`
pub fn position(calls: &[Call], pred: impl Fn(&Call) -> bool) -> Option<usize> {
    calls.iter().position(pred)
}
