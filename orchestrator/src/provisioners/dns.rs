use tracing::info;

use crate::config::CLIENT_PORT;
use crate::error::{ProvisionError, Result};
use crate::provider::DnsRegistry;
use crate::types::{NodeAddress, Region, ServiceRecordSet, Topology};

const RECORD_TTL: u32 = 60;

pub fn service_name(cluster_name: &str, region: &Region, zone_name: &str) -> String {
    format!("_{}-{}._tcp.{}", cluster_name, region, zone_name)
}

/// SRV records pointing at the private host names. Clients always connect
/// over private addresses, even in public-facing mode.
pub fn service_records(region: &Region, nodes: &[NodeAddress]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| format!("1 1 {} {}", CLIENT_PORT, n.private_hostname(region)))
        .collect()
}

pub async fn setup_dns_records<P>(
    provider: &P,
    cluster_name: &str,
    zone_name: &str,
    topology: &Topology,
) -> Result<()>
where
    P: DnsRegistry + ?Sized,
{
    let zone = provider
        .find_hosted_zone(zone_name)
        .await?
        .ok_or_else(|| ProvisionError::ResolutionFailure {
            what: format!("hosted zone {}", zone_name),
            region: "global".to_string(),
        })?;

    for (region, nodes) in topology.iter() {
        info!("Setting up Route53 SRV records in {}..", region);

        let records = ServiceRecordSet {
            name: service_name(cluster_name, region, zone_name),
            ttl: RECORD_TTL,
            records: service_records(region, nodes),
        };
        provider.upsert_service_records(&zone, &records).await?;
    }

    Ok(())
}
