use planb_cli::certs::SelfSignedIssuer;
use planb_cli::gateway::CloudGateway;
use planb_cli::http_client::HttpClient;
use planb_cli::rehearsal::dry_run;
use planb_orchestrator::provider::{AccessControl, DnsRegistry};
use planb_orchestrator::sim::{Operation, SimulatedCloud};
use planb_orchestrator::{ClusterConfig, Orchestrator, ProvisionError, Region, Timing};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::common::{self, fake_gateway};

async fn gateway_for(cloud: Arc<SimulatedCloud>) -> CloudGateway {
    let base_url = fake_gateway::start(cloud).await;
    let client = HttpClient::new(&base_url, Some("test-token".into()), Duration::from_secs(5))
        .expect("client");
    CloudGateway::new(client)
}

#[tokio::test]
async fn test_absent_lookups_are_none() {
    let regions = common::two_regions();
    let cloud = Arc::new(SimulatedCloud::with_default_network(&regions));
    let gateway = gateway_for(cloud.clone()).await;

    let bastion = gateway.find_bastion_access_group(&regions[0]).await.unwrap();
    assert_eq!(bastion, None);

    let zone = gateway.find_hosted_zone("db.example.org.").await.unwrap();
    assert_eq!(zone, None);

    cloud.add_bastion(&regions[0]);
    let bastion = gateway.find_bastion_access_group(&regions[0]).await.unwrap();
    assert!(bastion.is_some());
}

#[tokio::test]
async fn test_full_run_over_http() {
    let regions = common::two_regions();
    let cloud = Arc::new(SimulatedCloud::with_default_network(&regions));
    cloud.add_zone("db.example.org.");
    let gateway = gateway_for(cloud.clone()).await;
    let issuer = SelfSignedIssuer::default();

    let config = ClusterConfig::builder()
        .cluster_name("orders")
        .cluster_size(2)
        .regions(regions.clone())
        .public_facing(true)
        .hosted_zone(Some("db.example.org".into()))
        .alarm_topic(Some("db-alerts".into()))
        .timing(Timing::immediate())
        .build()
        .unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let report = Orchestrator::new(&gateway, &*cloud, &issuer)
        .with_registry_host("registry.example.org")
        .run(&config, &mut rng)
        .await
        .unwrap();

    assert_eq!(report.nodes.len(), 4);
    assert!(report.image.reference.starts_with("registry.example.org/"));
    assert_eq!(cloud.count(Operation::CreateInstance), 4);
    assert_eq!(cloud.count(Operation::AssociateAddress), 4);
    assert_eq!(cloud.count(Operation::UpsertRecords), 2);
    assert_eq!(cloud.count(Operation::CreateAlarm), 4);
    assert_eq!(cloud.live_groups().len(), 2);
}

#[tokio::test]
async fn test_server_failure_triggers_rollback() {
    let regions = common::two_regions();
    let cloud = Arc::new(SimulatedCloud::with_default_network(&regions));
    cloud.fail_on(Operation::CreateInstance, 2);
    let gateway = gateway_for(cloud.clone()).await;

    let mut rng = StdRng::seed_from_u64(3);
    let err = Orchestrator::new(&gateway, &*cloud, &*cloud)
        .run(&common::config(&regions, 1, true), &mut rng)
        .await
        .unwrap_err();

    match err {
        ProvisionError::Provider(e) => {
            assert_eq!(e.operation, "create_instance");
            assert_eq!(e.region, "eu-central-1");
            assert!(e.message.contains("injected failure"), "{}", e.message);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(cloud.live_groups().is_empty());
    assert!(cloud.live_allocations().is_empty());
}

#[tokio::test]
async fn test_dry_run() {
    let config = ClusterConfig::builder()
        .cluster_name("orders")
        .cluster_size(3)
        .region("eu-west-1")
        .region(Region::from("us-east-1"))
        .hosted_zone(Some("db.example.org".into()))
        .build()
        .unwrap();

    let report = dry_run(&config, CancellationToken::new()).await.unwrap();

    assert_eq!(report.nodes.len(), 6);
    assert_eq!(report.seed_nodes().count(), 6);
    assert_eq!(report.regions, config.regions());
}
