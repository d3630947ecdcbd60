use planb_orchestrator::sim::SimulatedCloud;
use planb_orchestrator::{ClusterConfig, Orchestrator, ProvisionReport, Result, Timing};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Full run against the in-memory cloud, without pacing. Every region gets
/// three availability zones with both subnet kinds, and the configured
/// hosted zone exists.
pub async fn dry_run(config: &ClusterConfig, cancel: CancellationToken) -> Result<ProvisionReport> {
    info!("Dry run: nothing will be created");
    let config = config.with_timing(Timing::immediate());

    let cloud = SimulatedCloud::with_default_network(config.regions());
    if let Some(zone) = config.hosted_zone() {
        cloud.add_zone(zone);
    }

    let mut rng = StdRng::from_entropy();
    let report = Orchestrator::new(&cloud, &cloud, &cloud)
        .with_cancellation(cancel)
        .run(&config, &mut rng)
        .await?;

    for node in &report.nodes {
        info!(
            "Would launch {} node {} in {} as {}",
            node.role, node.private_ip, node.region, node.instance
        );
    }
    Ok(report)
}
