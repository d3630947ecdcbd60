use planb_orchestrator::types::{
    AccessGroupHandle, AlarmTopicHandle, AllocationHandle, ImageHandle, IngressRule,
    InstanceId, InstanceState, ProfileHandle, Subnet, Tag, VolumeHandle, VolumeSpec, ZoneHandle,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

// ============================================================================
// Network
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubnetsResponse {
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressUsageResponse {
    pub in_use: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutableAddressResponse {
    pub public_ip: Ipv4Addr,
    pub allocation_id: AllocationHandle,
}

// ============================================================================
// Access Control
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessGroupRequest {
    pub name: String,
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGroupResponse {
    pub group_id: AccessGroupHandle,
}

// ============================================================================
// Images, DNS, Identity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineImageResponse {
    pub image_id: ImageHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZoneResponse {
    pub zone_id: ZoneHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: ProfileHandle,
}

// ============================================================================
// Monitoring
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmTopicRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmTopicResponse {
    pub topic: AlarmTopicHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryAlarmRequest {
    pub cluster_name: String,
    pub instance_id: InstanceId,
    pub topic: AlarmTopicHandle,
}

// ============================================================================
// Compute
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub availability_zone: String,
    pub volume: VolumeSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub volume_id: VolumeHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub instance_id: InstanceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStateResponse {
    pub state: InstanceState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociateAddressRequest {
    pub allocation_id: AllocationHandle,
}
