//! HTTP client for the cloud gateway.
//!
//! The gateway exposes the handful of cloud operations the orchestrator
//! needs as a small JSON API, one route per operation. Lookups answer 404
//! when the resource does not exist.

pub mod types;

use async_trait::async_trait;
use planb_orchestrator::error::ProviderError;
use planb_orchestrator::provider::{
    AccessControl, AddressPool, Compute, DnsRegistry, IdentityProvider, ImageCatalog, Monitoring,
    ProviderResult,
};
use planb_orchestrator::types::{
    AccessGroupHandle, AlarmTopicHandle, AllocationHandle, ImageHandle, IngressRule,
    InstanceId, InstanceSpec, InstanceState, ProfileHandle, Region, ServiceRecordSet, Subnet,
    Tag, VolumeHandle, VolumeSpec, ZoneHandle,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;

use crate::http_client::HttpClient;
use types::*;

const GLOBAL: &str = "global";

/// One gateway route plus what to report when calling it fails
struct Endpoint<'a> {
    operation: &'static str,
    region: &'a str,
    path: Vec<&'a str>,
    query: Vec<(&'static str, &'a str)>,
}

impl<'a> Endpoint<'a> {
    fn regional(operation: &'static str, region: &'a Region, rest: &[&'a str]) -> Self {
        let mut path = vec!["api", "regions", region.as_str()];
        path.extend_from_slice(rest);
        Self {
            operation,
            region: region.as_str(),
            path,
            query: Vec::new(),
        }
    }

    fn global(operation: &'static str, rest: &[&'a str]) -> Self {
        let mut path = vec!["api"];
        path.extend_from_slice(rest);
        Self {
            operation,
            region: GLOBAL,
            path,
            query: Vec::new(),
        }
    }

    fn query(mut self, key: &'static str, value: &'a str) -> Self {
        self.query.push((key, value));
        self
    }

    fn error(&self, message: impl fmt::Display) -> ProviderError {
        ProviderError::new(self.operation, self.region, message.to_string())
    }
}

pub struct CloudGateway {
    client: HttpClient,
}

impl CloudGateway {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    async fn exchange(
        &self,
        endpoint: &Endpoint<'_>,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> ProviderResult<Option<Vec<u8>>> {
        let url = self
            .client
            .build_url(&endpoint.path, &endpoint.query)
            .map_err(|e| endpoint.error(format!("{:#}", e)))?;
        debug!("{} -> {} {}", endpoint.operation, method, url);
        self.client
            .send(method, url, body.as_ref())
            .await
            .map_err(|e| endpoint.error(format!("{:#}", e)))
    }

    /// GET that may legitimately find nothing
    async fn lookup<T: DeserializeOwned>(&self, endpoint: Endpoint<'_>) -> ProviderResult<Option<T>> {
        match self.exchange(&endpoint, Method::GET, None).await? {
            Some(bytes) => decode(&endpoint, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint<'_>,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> ProviderResult<T> {
        match self.exchange(&endpoint, method, body).await? {
            Some(bytes) => decode(&endpoint, &bytes),
            None => Err(endpoint.error("not found")),
        }
    }

    async fn execute(
        &self,
        endpoint: Endpoint<'_>,
        method: Method,
        body: Option<serde_json::Value>,
    ) -> ProviderResult<()> {
        match self.exchange(&endpoint, method, body).await? {
            Some(_) => Ok(()),
            None => Err(endpoint.error("not found")),
        }
    }
}

fn decode<T: DeserializeOwned>(endpoint: &Endpoint<'_>, bytes: &[u8]) -> ProviderResult<T> {
    serde_json::from_slice(bytes).map_err(|e| endpoint.error(format!("invalid response: {}", e)))
}

fn encode<T: Serialize>(endpoint: &Endpoint<'_>, body: &T) -> ProviderResult<Option<serde_json::Value>> {
    serde_json::to_value(body)
        .map(Some)
        .map_err(|e| endpoint.error(format!("invalid request: {}", e)))
}

#[async_trait]
impl AddressPool for CloudGateway {
    async fn enumerate_subnets(
        &self,
        region: &Region,
        name_prefix: &str,
    ) -> ProviderResult<Vec<Subnet>> {
        let endpoint =
            Endpoint::regional("enumerate_subnets", region, &["subnets"]).query("prefix", name_prefix);
        let resp: SubnetsResponse = self.fetch(endpoint, Method::GET, None).await?;

        // the allocator relies on zone order for round-robin placement
        let mut subnets = resp.subnets;
        subnets.sort_by(|a, b| a.availability_zone.cmp(&b.availability_zone));
        Ok(subnets)
    }

    async fn is_private_address_in_use(
        &self,
        region: &Region,
        address: Ipv4Addr,
    ) -> ProviderResult<bool> {
        let address = address.to_string();
        let endpoint =
            Endpoint::regional("is_private_address_in_use", region, &["addresses", &address]);
        let resp: AddressUsageResponse = self.fetch(endpoint, Method::GET, None).await?;
        Ok(resp.in_use)
    }

    async fn allocate_routable_address(
        &self,
        region: &Region,
    ) -> ProviderResult<(Ipv4Addr, AllocationHandle)> {
        let endpoint =
            Endpoint::regional("allocate_routable_address", region, &["routable-addresses"]);
        let resp: RoutableAddressResponse = self.fetch(endpoint, Method::POST, None).await?;
        Ok((resp.public_ip, resp.allocation_id))
    }

    async fn release_routable_address(
        &self,
        region: &Region,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()> {
        let endpoint = Endpoint::regional(
            "release_routable_address",
            region,
            &["routable-addresses", &allocation.0],
        );
        self.execute(endpoint, Method::DELETE, None).await
    }
}

#[async_trait]
impl AccessControl for CloudGateway {
    async fn create_access_group(
        &self,
        region: &Region,
        name: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<AccessGroupHandle> {
        let endpoint = Endpoint::regional("create_access_group", region, &["access-groups"]);
        let body = encode(
            &endpoint,
            &CreateAccessGroupRequest {
                name: name.to_string(),
                rules: rules.to_vec(),
            },
        )?;
        let resp: AccessGroupResponse = self.fetch(endpoint, Method::POST, body).await?;
        Ok(resp.group_id)
    }

    async fn delete_access_group(
        &self,
        region: &Region,
        group: &AccessGroupHandle,
    ) -> ProviderResult<()> {
        let endpoint =
            Endpoint::regional("delete_access_group", region, &["access-groups", &group.0]);
        self.execute(endpoint, Method::DELETE, None).await
    }

    async fn find_bastion_access_group(
        &self,
        region: &Region,
    ) -> ProviderResult<Option<AccessGroupHandle>> {
        let endpoint = Endpoint::regional("find_bastion_access_group", region, &["bastion-group"]);
        let resp: Option<AccessGroupResponse> = self.lookup(endpoint).await?;
        Ok(resp.map(|r| r.group_id))
    }
}

#[async_trait]
impl ImageCatalog for CloudGateway {
    async fn resolve_latest_machine_image(
        &self,
        region: &Region,
        name_pattern: &str,
    ) -> ProviderResult<Option<ImageHandle>> {
        let endpoint = Endpoint::regional(
            "resolve_latest_machine_image",
            region,
            &["machine-images", "latest"],
        )
        .query("pattern", name_pattern);
        let resp: Option<MachineImageResponse> = self.lookup(endpoint).await?;
        Ok(resp.map(|r| r.image_id))
    }
}

#[async_trait]
impl DnsRegistry for CloudGateway {
    async fn find_hosted_zone(&self, zone_name: &str) -> ProviderResult<Option<ZoneHandle>> {
        let endpoint = Endpoint::global("find_hosted_zone", &["hosted-zones", zone_name]);
        let resp: Option<HostedZoneResponse> = self.lookup(endpoint).await?;
        Ok(resp.map(|r| r.zone_id))
    }

    async fn upsert_service_records(
        &self,
        zone: &ZoneHandle,
        records: &ServiceRecordSet,
    ) -> ProviderResult<()> {
        let endpoint =
            Endpoint::global("upsert_service_records", &["hosted-zones", &zone.0, "records"]);
        let body = encode(&endpoint, records)?;
        self.execute(endpoint, Method::PUT, body).await
    }
}

#[async_trait]
impl IdentityProvider for CloudGateway {
    async fn ensure_identity_profile(&self, cluster_name: &str) -> ProviderResult<ProfileHandle> {
        let endpoint =
            Endpoint::global("ensure_identity_profile", &["identity-profiles", cluster_name]);
        let resp: ProfileResponse = self.fetch(endpoint, Method::PUT, None).await?;
        Ok(resp.profile)
    }
}

#[async_trait]
impl Monitoring for CloudGateway {
    async fn ensure_alarm_topic(
        &self,
        region: &Region,
        topic_name: &str,
        email: Option<&str>,
    ) -> ProviderResult<AlarmTopicHandle> {
        let endpoint =
            Endpoint::regional("ensure_alarm_topic", region, &["alarm-topics", topic_name]);
        let body = encode(
            &endpoint,
            &AlarmTopicRequest {
                email: email.map(str::to_string),
            },
        )?;
        let resp: AlarmTopicResponse = self.fetch(endpoint, Method::PUT, body).await?;
        Ok(resp.topic)
    }

    async fn create_recovery_alarm(
        &self,
        region: &Region,
        cluster_name: &str,
        instance: &InstanceId,
        topic: &AlarmTopicHandle,
    ) -> ProviderResult<()> {
        let endpoint = Endpoint::regional("create_recovery_alarm", region, &["recovery-alarms"]);
        let body = encode(
            &endpoint,
            &RecoveryAlarmRequest {
                cluster_name: cluster_name.to_string(),
                instance_id: instance.clone(),
                topic: topic.clone(),
            },
        )?;
        self.execute(endpoint, Method::POST, body).await
    }
}

#[async_trait]
impl Compute for CloudGateway {
    async fn create_volume(
        &self,
        region: &Region,
        availability_zone: &str,
        spec: &VolumeSpec,
    ) -> ProviderResult<VolumeHandle> {
        let endpoint = Endpoint::regional("create_volume", region, &["volumes"]);
        let body = encode(
            &endpoint,
            &CreateVolumeRequest {
                availability_zone: availability_zone.to_string(),
                volume: spec.clone(),
            },
        )?;
        let resp: VolumeResponse = self.fetch(endpoint, Method::POST, body).await?;
        Ok(resp.volume_id)
    }

    async fn create_instance(
        &self,
        region: &Region,
        spec: &InstanceSpec,
    ) -> ProviderResult<InstanceId> {
        let endpoint = Endpoint::regional("create_instance", region, &["instances"]);
        let body = encode(&endpoint, spec)?;
        let resp: InstanceResponse = self.fetch(endpoint, Method::POST, body).await?;
        Ok(resp.instance_id)
    }

    async fn tag_resource(
        &self,
        region: &Region,
        resource: &str,
        tags: &[Tag],
    ) -> ProviderResult<()> {
        let endpoint =
            Endpoint::regional("tag_resource", region, &["resources", resource, "tags"]);
        let body = encode(
            &endpoint,
            &TagsRequest {
                tags: tags.to_vec(),
            },
        )?;
        self.execute(endpoint, Method::PUT, body).await
    }

    async fn get_instance_state(
        &self,
        region: &Region,
        instance: &InstanceId,
    ) -> ProviderResult<InstanceState> {
        let endpoint =
            Endpoint::regional("get_instance_state", region, &["instances", &instance.0]);
        let resp: InstanceStateResponse = self.fetch(endpoint, Method::GET, None).await?;
        Ok(resp.state)
    }

    async fn associate_public_address(
        &self,
        region: &Region,
        instance: &InstanceId,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()> {
        let endpoint = Endpoint::regional(
            "associate_public_address",
            region,
            &["instances", &instance.0, "public-address"],
        );
        let body = encode(
            &endpoint,
            &AssociateAddressRequest {
                allocation_id: allocation.clone(),
            },
        )?;
        self.execute(endpoint, Method::POST, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_endpoint_path() {
        let region = Region::from("eu-west-1");
        let endpoint = Endpoint::regional("get_instance_state", &region, &["instances", "i-1"])
            .query("verbose", "1");

        assert_eq!(
            endpoint.path,
            vec!["api", "regions", "eu-west-1", "instances", "i-1"]
        );
        assert_eq!(endpoint.query, vec![("verbose", "1")]);
    }

    #[test]
    fn test_endpoint_error_names_operation() {
        let endpoint = Endpoint::global("find_hosted_zone", &["hosted-zones", "example.org."]);
        let err = endpoint.error("status=500");

        assert_eq!(err.operation, "find_hosted_zone");
        assert_eq!(err.region, "global");
        assert_eq!(err.to_string(), "find_hosted_zone failed in global: status=500");
    }
}
