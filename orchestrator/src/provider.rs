//! Collaborator interfaces of the orchestrator.
//!
//! Each provisioning stage depends on the narrowest trait it needs; a full
//! cloud backend implements all of them and thereby [`CloudProvider`].

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::error::ProviderError;
use crate::types::{
    AccessGroupHandle, AlarmTopicHandle, AllocationHandle, ImageHandle, IngressRule,
    InstanceId, InstanceSpec, InstanceState, KeyMaterial, ProfileHandle, Region,
    ServiceRecordSet, Subnet, Tag, VolumeHandle, VolumeSpec, ZoneHandle,
};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Subnet enumeration and address bookkeeping
#[async_trait]
pub trait AddressPool: Send + Sync {
    /// Subnets whose display name starts with `name_prefix`, sorted by
    /// availability zone
    async fn enumerate_subnets(&self, region: &Region, name_prefix: &str)
        -> ProviderResult<Vec<Subnet>>;

    async fn is_private_address_in_use(
        &self,
        region: &Region,
        address: Ipv4Addr,
    ) -> ProviderResult<bool>;

    async fn allocate_routable_address(
        &self,
        region: &Region,
    ) -> ProviderResult<(Ipv4Addr, AllocationHandle)>;

    async fn release_routable_address(
        &self,
        region: &Region,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn create_access_group(
        &self,
        region: &Region,
        name: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<AccessGroupHandle>;

    async fn delete_access_group(
        &self,
        region: &Region,
        group: &AccessGroupHandle,
    ) -> ProviderResult<()>;

    /// The well-known SSH bastion group, if the region has one
    async fn find_bastion_access_group(
        &self,
        region: &Region,
    ) -> ProviderResult<Option<AccessGroupHandle>>;
}

#[async_trait]
pub trait ImageCatalog: Send + Sync {
    /// Most recent private machine image whose name matches `name_pattern`
    async fn resolve_latest_machine_image(
        &self,
        region: &Region,
        name_pattern: &str,
    ) -> ProviderResult<Option<ImageHandle>>;
}

#[async_trait]
pub trait DnsRegistry: Send + Sync {
    async fn find_hosted_zone(&self, zone_name: &str) -> ProviderResult<Option<ZoneHandle>>;

    async fn upsert_service_records(
        &self,
        zone: &ZoneHandle,
        records: &ServiceRecordSet,
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Get-or-create the instance profile of the cluster
    async fn ensure_identity_profile(&self, cluster_name: &str) -> ProviderResult<ProfileHandle>;
}

#[async_trait]
pub trait Monitoring: Send + Sync {
    async fn ensure_alarm_topic(
        &self,
        region: &Region,
        topic_name: &str,
        email: Option<&str>,
    ) -> ProviderResult<AlarmTopicHandle>;

    async fn create_recovery_alarm(
        &self,
        region: &Region,
        cluster_name: &str,
        instance: &InstanceId,
        topic: &AlarmTopicHandle,
    ) -> ProviderResult<()>;
}

#[async_trait]
pub trait Compute: Send + Sync {
    async fn create_volume(
        &self,
        region: &Region,
        availability_zone: &str,
        spec: &VolumeSpec,
    ) -> ProviderResult<VolumeHandle>;

    async fn create_instance(&self, region: &Region, spec: &InstanceSpec)
        -> ProviderResult<InstanceId>;

    async fn tag_resource(&self, region: &Region, resource: &str, tags: &[Tag])
        -> ProviderResult<()>;

    async fn get_instance_state(
        &self,
        region: &Region,
        instance: &InstanceId,
    ) -> ProviderResult<InstanceState>;

    async fn associate_public_address(
        &self,
        region: &Region,
        instance: &InstanceId,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()>;
}

/// Everything the orchestrator needs from one cloud account
pub trait CloudProvider:
    AddressPool + AccessControl + ImageCatalog + DnsRegistry + IdentityProvider + Monitoring + Compute
{
}

impl<T> CloudProvider for T where
    T: AddressPool
        + AccessControl
        + ImageCatalog
        + DnsRegistry
        + IdentityProvider
        + Monitoring
        + Compute
{
}

/// Looks up the most recent published version of a container artifact
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn latest_version(&self, artifact_name: &str) -> ProviderResult<Option<String>>;
}

/// Issues the TLS key material shipped to every node
pub trait CertificateIssuer: Send + Sync {
    fn issue(&self, cluster_name: &str) -> ProviderResult<KeyMaterial>;
}
