use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{INTER_NODE_PORT, SSH_PORT};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::provider::AccessControl;
use crate::types::{AccessGroupHandle, IngressRule, Protocol, Region, RuleSource, Topology};

/// Ingress rules for one region's group.
///
/// In public-facing mode every node of every region may reach the
/// inter-node port, so the rule count grows with the total node count.
pub fn access_rules(
    public_facing: bool,
    topology: &Topology,
    bastion: Option<&AccessGroupHandle>,
) -> Vec<IngressRule> {
    let mut rules = Vec::new();

    if public_facing {
        for public_ip in topology.all_nodes().filter_map(|n| n.public_ip) {
            rules.push(IngressRule {
                protocol: Protocol::Tcp,
                ports: Some((INTER_NODE_PORT, INTER_NODE_PORT)),
                source: RuleSource::Cidr(Ipv4Net::from(public_ip)),
            });
        }
    }

    rules.push(IngressRule {
        protocol: Protocol::All,
        ports: None,
        source: RuleSource::OwnGroup,
    });

    if let Some(bastion) = bastion {
        rules.push(IngressRule {
            protocol: Protocol::Tcp,
            ports: Some((SSH_PORT, SSH_PORT)),
            source: RuleSource::Group(bastion.clone()),
        });
    }

    rules
}

/// Create one group per region, named after the cluster
pub async fn setup_access_groups<P>(
    provider: &P,
    cluster_name: &str,
    public_facing: bool,
    topology: &Topology,
    ledger: &mut Ledger,
) -> Result<BTreeMap<Region, AccessGroupHandle>>
where
    P: AccessControl + ?Sized,
{
    let mut groups = BTreeMap::new();

    for region in topology.regions() {
        info!("Configuring Security Group in {}..", region);

        let bastion = provider.find_bastion_access_group(region).await?;
        if bastion.is_none() {
            info!("No Odd host in region {}, skipping Security Group rule.", region);
        }

        let rules = access_rules(public_facing, topology, bastion.as_ref());
        let group = provider
            .create_access_group(region, cluster_name, &rules)
            .await?;
        ledger.record_access_group(region.clone(), group.clone());

        groups.insert(region.clone(), group);
    }

    Ok(groups)
}
