use planb_orchestrator::sim::{Operation, SimulatedCloud};
use planb_orchestrator::{ClusterConfig, ProvisionError, Region, Timing};
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::common::{self, provision};

fn small_config(regions: &[Region], size: usize) -> ClusterConfig {
    ClusterConfig::builder()
        .cluster_name("orders")
        .cluster_size(size)
        .regions(regions.to_vec())
        .reserved_addresses(1)
        .timing(Timing::immediate())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_two_regions_single_small_subnet() {
    let regions = common::two_regions();
    let cloud = SimulatedCloud::new();
    cloud.add_subnet(&regions[0], "eu-west-1a", "10.0.0.0/29", "internal-eu-west-1a");
    cloud.add_subnet(&regions[1], "eu-central-1a", "10.1.0.0/29", "internal-eu-central-1a");

    let report = provision(&cloud, &small_config(&regions, 2)).await.unwrap();

    for (r, region) in regions.iter().enumerate() {
        let nodes: Vec<Ipv4Addr> = report
            .topology
            .get(region)
            .unwrap()
            .iter()
            .map(|n| n.private_ip)
            .collect();
        // first host is reserved
        assert_eq!(
            nodes,
            vec![Ipv4Addr::new(10, r as u8, 0, 2), Ipv4Addr::new(10, r as u8, 0, 3)]
        );
    }
    // both nodes of each region are seeds
    assert_eq!(report.seed_nodes().count(), 4);
}

#[tokio::test]
async fn test_pool_depleted() {
    let regions = vec![Region::from("eu-west-1")];
    let cloud = SimulatedCloud::new();
    cloud.add_subnet(&regions[0], "eu-west-1a", "10.0.0.0/30", "internal-eu-west-1a");

    let err = provision(&cloud, &small_config(&regions, 2))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProvisionError::PoolDepleted {
            cidr: "10.0.0.0/30".parse().unwrap()
        }
    );
    assert_eq!(cloud.count(Operation::CreateGroup), 0);
    assert_eq!(cloud.count(Operation::CreateInstance), 0);
}

#[tokio::test]
async fn test_addresses_in_use_are_skipped() {
    let regions = vec![Region::from("eu-west-1")];
    let cloud = SimulatedCloud::new();
    cloud.add_subnet(&regions[0], "eu-west-1a", "10.0.0.0/28", "internal-eu-west-1a");
    cloud.mark_in_use(&regions[0], Ipv4Addr::new(10, 0, 0, 2));
    cloud.mark_in_use(&regions[0], Ipv4Addr::new(10, 0, 0, 4));

    let report = provision(&cloud, &small_config(&regions, 3)).await.unwrap();

    let nodes: Vec<Ipv4Addr> = report.topology.all_nodes().map(|n| n.private_ip).collect();
    assert_eq!(
        nodes,
        vec![
            Ipv4Addr::new(10, 0, 0, 3),
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 6),
        ]
    );
}

#[tokio::test]
async fn test_no_address_handed_out_twice() {
    // identical address plans in both regions
    let regions = common::two_regions();
    let cloud = SimulatedCloud::new();
    for region in &regions {
        for (zone, cidr) in [("a", "10.0.0.0/28"), ("b", "10.0.1.0/28")] {
            cloud.add_subnet(
                region,
                &format!("{}{}", region, zone),
                cidr,
                &format!("internal-{}", zone),
            );
        }
    }

    let report = provision(&cloud, &small_config(&regions, 4)).await.unwrap();

    let all: Vec<Ipv4Addr> = report.topology.all_nodes().map(|n| n.private_ip).collect();
    let unique: HashSet<_> = all.iter().collect();
    assert_eq!(all.len(), 8);
    assert_eq!(unique.len(), 8);
}

#[tokio::test]
async fn test_only_matching_subnets_are_used() {
    let regions = vec![Region::from("eu-west-1")];
    let cloud = SimulatedCloud::new();
    cloud.add_subnet(&regions[0], "eu-west-1a", "10.0.0.0/28", "internal-eu-west-1a");
    cloud.add_subnet(&regions[0], "eu-west-1b", "10.9.0.0/28", "legacy-eu-west-1b");

    let report = provision(&cloud, &small_config(&regions, 2)).await.unwrap();

    assert!(report
        .topology
        .all_nodes()
        .all(|n| n.private_ip.octets()[1] == 0));
}
