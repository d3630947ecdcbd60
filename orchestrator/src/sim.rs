//! In-memory cloud used for dry runs and tests.
//!
//! Every successful collaborator call is recorded in order, so callers can
//! assert on sequencing. Failures can be injected on the N-th call of an
//! operation.

use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};

use crate::error::ProviderError;
use crate::provider::{
    AccessControl, AddressPool, ArtifactResolver, CertificateIssuer, Compute, DnsRegistry,
    IdentityProvider, ImageCatalog, Monitoring, ProviderResult,
};
use crate::types::{
    AccessGroupHandle, AlarmTopicHandle, AllocationHandle, ImageHandle, IngressRule,
    InstanceId, InstanceSpec, InstanceState, KeyMaterial, ProfileHandle, Region,
    ServiceRecordSet, Subnet, Tag, VolumeHandle, VolumeSpec, ZoneHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    EnumerateSubnets,
    AddressInUse,
    AllocateAddress,
    ReleaseAddress,
    CreateGroup,
    DeleteGroup,
    FindBastion,
    ResolveImage,
    FindZone,
    UpsertRecords,
    EnsureProfile,
    EnsureTopic,
    CreateAlarm,
    CreateVolume,
    CreateInstance,
    TagResource,
    GetInstanceState,
    AssociateAddress,
    LatestVersion,
    IssueCertificate,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::EnumerateSubnets => "enumerate_subnets",
            Operation::AddressInUse => "is_private_address_in_use",
            Operation::AllocateAddress => "allocate_routable_address",
            Operation::ReleaseAddress => "release_routable_address",
            Operation::CreateGroup => "create_access_group",
            Operation::DeleteGroup => "delete_access_group",
            Operation::FindBastion => "find_bastion_access_group",
            Operation::ResolveImage => "resolve_latest_machine_image",
            Operation::FindZone => "find_hosted_zone",
            Operation::UpsertRecords => "upsert_service_records",
            Operation::EnsureProfile => "ensure_identity_profile",
            Operation::EnsureTopic => "ensure_alarm_topic",
            Operation::CreateAlarm => "create_recovery_alarm",
            Operation::CreateVolume => "create_volume",
            Operation::CreateInstance => "create_instance",
            Operation::TagResource => "tag_resource",
            Operation::GetInstanceState => "get_instance_state",
            Operation::AssociateAddress => "associate_public_address",
            Operation::LatestVersion => "latest_version",
            Operation::IssueCertificate => "issue_certificate",
        }
    }
}

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnumerateSubnets { region: Region, prefix: String },
    AddressInUse { region: Region, address: Ipv4Addr },
    AllocateAddress { region: Region, allocation: AllocationHandle },
    ReleaseAddress { region: Region, allocation: AllocationHandle },
    CreateGroup { region: Region, name: String, group: AccessGroupHandle, rules: Vec<IngressRule> },
    DeleteGroup { region: Region, group: AccessGroupHandle },
    FindBastion { region: Region },
    ResolveImage { region: Region, pattern: String },
    FindZone { zone: String },
    UpsertRecords { zone: ZoneHandle, records: ServiceRecordSet },
    EnsureProfile { cluster: String },
    EnsureTopic { region: Region, topic: String, email: Option<String> },
    CreateAlarm { region: Region, instance: InstanceId, topic: AlarmTopicHandle },
    CreateVolume { region: Region, zone: String, spec: VolumeSpec },
    CreateInstance { region: Region, instance: InstanceId, spec: InstanceSpec },
    TagResource { region: Region, resource: String, tags: Vec<Tag> },
    GetInstanceState { region: Region, instance: InstanceId },
    AssociateAddress { region: Region, instance: InstanceId, allocation: AllocationHandle },
}

/// How long new instances report `pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPolls {
    Count(usize),
    Forever,
}

struct SimState {
    subnets: HashMap<Region, Vec<Subnet>>,
    in_use: HashSet<(Region, Ipv4Addr)>,
    bastions: HashMap<Region, AccessGroupHandle>,
    zones: HashMap<String, ZoneHandle>,
    missing_images: HashSet<Region>,
    artifact_version: Option<String>,
    pending_polls: PendingPolls,
    polls: HashMap<InstanceId, usize>,
    failures: HashMap<Operation, usize>,
    counts: HashMap<Operation, usize>,
    calls: Vec<Call>,
    live_groups: Vec<(Region, AccessGroupHandle)>,
    live_allocations: Vec<(Region, AllocationHandle)>,
    next_id: u64,
}

pub struct SimulatedCloud {
    state: Mutex<SimState>,
}

impl SimulatedCloud {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                subnets: HashMap::new(),
                in_use: HashSet::new(),
                bastions: HashMap::new(),
                zones: HashMap::new(),
                missing_images: HashSet::new(),
                artifact_version: Some("latest".to_string()),
                pending_polls: PendingPolls::Count(1),
                polls: HashMap::new(),
                failures: HashMap::new(),
                counts: HashMap::new(),
                calls: Vec::new(),
                live_groups: Vec::new(),
                live_allocations: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Three availability zones per region, each with one `internal-` and
    /// one `dmz-` /24 subnet. Blocks never overlap within a region, however
    /// many regions are given.
    pub fn with_default_network(regions: &[Region]) -> Self {
        let cloud = Self::new();
        for (i, region) in regions.iter().enumerate() {
            for (j, zone) in ["a", "b", "c"].iter().enumerate() {
                let az = format!("{}{}", region, zone);
                let (internal, dmz) = default_blocks(i, j);
                cloud.push_subnet(region, &az, internal, &format!("internal-{}", az));
                cloud.push_subnet(region, &az, dmz, &format!("dmz-{}", az));
            }
        }
        cloud
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a subnet; panics on an invalid CIDR since this is fixture setup
    pub fn add_subnet(&self, region: &Region, availability_zone: &str, cidr: &str, name: &str) {
        let cidr_block: Ipv4Net = cidr.parse().unwrap_or_else(|e| {
            panic!("invalid CIDR {}: {}", cidr, e);
        });
        self.push_subnet(region, availability_zone, cidr_block, name);
    }

    fn push_subnet(&self, region: &Region, availability_zone: &str, cidr_block: Ipv4Net, name: &str) {
        let mut state = self.state();
        let subnets = state.subnets.entry(region.clone()).or_default();
        subnets.push(Subnet {
            subnet_id: format!("subnet-{}", subnets.len() + 1),
            availability_zone: availability_zone.to_string(),
            cidr_block,
            name: name.to_string(),
        });
    }

    pub fn mark_in_use(&self, region: &Region, address: Ipv4Addr) {
        self.state().in_use.insert((region.clone(), address));
    }

    pub fn add_bastion(&self, region: &Region) {
        let handle = AccessGroupHandle(format!("sg-bastion-{}", region));
        self.state().bastions.insert(region.clone(), handle);
    }

    pub fn add_zone(&self, zone_name: &str) {
        let handle = ZoneHandle(format!("zone-{}", zone_name.trim_end_matches('.')));
        self.state().zones.insert(zone_name.to_string(), handle);
    }

    pub fn remove_image(&self, region: &Region) {
        self.state().missing_images.insert(region.clone());
    }

    pub fn set_artifact_version(&self, version: Option<&str>) {
        self.state().artifact_version = version.map(str::to_string);
    }

    pub fn set_pending_polls(&self, polls: PendingPolls) {
        self.state().pending_polls = polls;
    }

    /// Fail the `nth` (1-based) call of `operation`
    pub fn fail_on(&self, operation: Operation, nth: usize) {
        self.state().failures.insert(operation, nth);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Number of successful calls of `operation`
    pub fn count(&self, operation: Operation) -> usize {
        let state = self.state();
        let attempts = state.counts.get(&operation).copied().unwrap_or(0);
        let failed = state
            .failures
            .get(&operation)
            .map_or(0, |nth| usize::from(*nth <= attempts));
        attempts - failed
    }

    pub fn live_groups(&self) -> Vec<(Region, AccessGroupHandle)> {
        self.state().live_groups.clone()
    }

    pub fn live_allocations(&self) -> Vec<(Region, AllocationHandle)> {
        self.state().live_allocations.clone()
    }

    /// Private addresses of created instances, in creation order
    pub fn launched(&self) -> Vec<(Region, Ipv4Addr)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateInstance { region, spec, .. } => Some((region.clone(), spec.private_ip)),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, operation: Operation, region: &str) -> ProviderResult<MutexGuard<'_, SimState>> {
        let mut state = self.state();
        let count = {
            let count = state.counts.entry(operation).or_insert(0);
            *count += 1;
            *count
        };
        if state.failures.get(&operation) == Some(&count) {
            return Err(ProviderError::new(operation.as_str(), region, "injected failure"));
        }
        Ok(state)
    }
}

/// Internal and dmz /24 blocks of zone `zone` in the `region`-th region.
/// The first 256 regions get `10.{region}.{zone}.0` and the first 16 get
/// `172.{16 + region}.{zone}.0`; later ones move up the third octet.
fn default_blocks(region: usize, zone: usize) -> (Ipv4Net, Ipv4Net) {
    let internal = Ipv4Addr::new(
        10,
        (region % 256) as u8,
        ((region / 256 % 85) * 3 + zone) as u8,
        0,
    );
    let dmz = Ipv4Addr::new(
        172,
        (16 + region % 16) as u8,
        ((region / 16 % 85) * 3 + zone) as u8,
        0,
    );
    (block24(internal), block24(dmz))
}

fn block24(base: Ipv4Addr) -> Ipv4Net {
    // 24 is always a valid prefix length
    Ipv4Net::new(base, 24).unwrap_or_else(|_| Ipv4Net::from(base))
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimState {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{}-{:08x}", prefix, id)
    }
}

#[async_trait]
impl AddressPool for SimulatedCloud {
    async fn enumerate_subnets(
        &self,
        region: &Region,
        name_prefix: &str,
    ) -> ProviderResult<Vec<Subnet>> {
        let mut state = self.begin(Operation::EnumerateSubnets, region.as_str())?;
        let mut subnets: Vec<Subnet> = state
            .subnets
            .get(region)
            .map(|s| {
                s.iter()
                    .filter(|subnet| subnet.name.starts_with(name_prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        subnets.sort_by(|a, b| a.availability_zone.cmp(&b.availability_zone));
        state.calls.push(Call::EnumerateSubnets {
            region: region.clone(),
            prefix: name_prefix.to_string(),
        });
        Ok(subnets)
    }

    async fn is_private_address_in_use(
        &self,
        region: &Region,
        address: Ipv4Addr,
    ) -> ProviderResult<bool> {
        let mut state = self.begin(Operation::AddressInUse, region.as_str())?;
        state.calls.push(Call::AddressInUse {
            region: region.clone(),
            address,
        });
        Ok(state.in_use.contains(&(region.clone(), address)))
    }

    async fn allocate_routable_address(
        &self,
        region: &Region,
    ) -> ProviderResult<(Ipv4Addr, AllocationHandle)> {
        let mut state = self.begin(Operation::AllocateAddress, region.as_str())?;
        let address = Ipv4Addr::from(0x3400_0000u32 + state.next_id as u32);
        let allocation = AllocationHandle(state.next_id("eipalloc"));
        state
            .live_allocations
            .push((region.clone(), allocation.clone()));
        state.calls.push(Call::AllocateAddress {
            region: region.clone(),
            allocation: allocation.clone(),
        });
        Ok((address, allocation))
    }

    async fn release_routable_address(
        &self,
        region: &Region,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::ReleaseAddress, region.as_str())?;
        state
            .live_allocations
            .retain(|(r, a)| !(r == region && a == allocation));
        state.calls.push(Call::ReleaseAddress {
            region: region.clone(),
            allocation: allocation.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl AccessControl for SimulatedCloud {
    async fn create_access_group(
        &self,
        region: &Region,
        name: &str,
        rules: &[IngressRule],
    ) -> ProviderResult<AccessGroupHandle> {
        let mut state = self.begin(Operation::CreateGroup, region.as_str())?;
        let group = AccessGroupHandle(state.next_id("sg"));
        state.live_groups.push((region.clone(), group.clone()));
        state.calls.push(Call::CreateGroup {
            region: region.clone(),
            name: name.to_string(),
            group: group.clone(),
            rules: rules.to_vec(),
        });
        Ok(group)
    }

    async fn delete_access_group(
        &self,
        region: &Region,
        group: &AccessGroupHandle,
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::DeleteGroup, region.as_str())?;
        state.live_groups.retain(|(r, g)| !(r == region && g == group));
        state.calls.push(Call::DeleteGroup {
            region: region.clone(),
            group: group.clone(),
        });
        Ok(())
    }

    async fn find_bastion_access_group(
        &self,
        region: &Region,
    ) -> ProviderResult<Option<AccessGroupHandle>> {
        let mut state = self.begin(Operation::FindBastion, region.as_str())?;
        state.calls.push(Call::FindBastion {
            region: region.clone(),
        });
        Ok(state.bastions.get(region).cloned())
    }
}

#[async_trait]
impl ImageCatalog for SimulatedCloud {
    async fn resolve_latest_machine_image(
        &self,
        region: &Region,
        name_pattern: &str,
    ) -> ProviderResult<Option<ImageHandle>> {
        let mut state = self.begin(Operation::ResolveImage, region.as_str())?;
        state.calls.push(Call::ResolveImage {
            region: region.clone(),
            pattern: name_pattern.to_string(),
        });
        if state.missing_images.contains(region) {
            return Ok(None);
        }
        Ok(Some(ImageHandle(format!("ami-sim-{}", region))))
    }
}

#[async_trait]
impl DnsRegistry for SimulatedCloud {
    async fn find_hosted_zone(&self, zone_name: &str) -> ProviderResult<Option<ZoneHandle>> {
        let mut state = self.begin(Operation::FindZone, "global")?;
        state.calls.push(Call::FindZone {
            zone: zone_name.to_string(),
        });
        Ok(state.zones.get(zone_name).cloned())
    }

    async fn upsert_service_records(
        &self,
        zone: &ZoneHandle,
        records: &ServiceRecordSet,
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::UpsertRecords, "global")?;
        state.calls.push(Call::UpsertRecords {
            zone: zone.clone(),
            records: records.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for SimulatedCloud {
    async fn ensure_identity_profile(&self, cluster_name: &str) -> ProviderResult<ProfileHandle> {
        let mut state = self.begin(Operation::EnsureProfile, "global")?;
        state.calls.push(Call::EnsureProfile {
            cluster: cluster_name.to_string(),
        });
        Ok(ProfileHandle(format!("profile/{}", cluster_name)))
    }
}

#[async_trait]
impl Monitoring for SimulatedCloud {
    async fn ensure_alarm_topic(
        &self,
        region: &Region,
        topic_name: &str,
        email: Option<&str>,
    ) -> ProviderResult<AlarmTopicHandle> {
        let mut state = self.begin(Operation::EnsureTopic, region.as_str())?;
        state.calls.push(Call::EnsureTopic {
            region: region.clone(),
            topic: topic_name.to_string(),
            email: email.map(str::to_string),
        });
        Ok(AlarmTopicHandle(format!("topic:{}:{}", region, topic_name)))
    }

    async fn create_recovery_alarm(
        &self,
        region: &Region,
        _cluster_name: &str,
        instance: &InstanceId,
        topic: &AlarmTopicHandle,
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::CreateAlarm, region.as_str())?;
        state.calls.push(Call::CreateAlarm {
            region: region.clone(),
            instance: instance.clone(),
            topic: topic.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl Compute for SimulatedCloud {
    async fn create_volume(
        &self,
        region: &Region,
        availability_zone: &str,
        spec: &VolumeSpec,
    ) -> ProviderResult<VolumeHandle> {
        let mut state = self.begin(Operation::CreateVolume, region.as_str())?;
        let volume = VolumeHandle(state.next_id("vol"));
        state.calls.push(Call::CreateVolume {
            region: region.clone(),
            zone: availability_zone.to_string(),
            spec: spec.clone(),
        });
        Ok(volume)
    }

    async fn create_instance(
        &self,
        region: &Region,
        spec: &InstanceSpec,
    ) -> ProviderResult<InstanceId> {
        let mut state = self.begin(Operation::CreateInstance, region.as_str())?;
        let instance = InstanceId(state.next_id("i"));
        state.in_use.insert((region.clone(), spec.private_ip));
        state.calls.push(Call::CreateInstance {
            region: region.clone(),
            instance: instance.clone(),
            spec: spec.clone(),
        });
        Ok(instance)
    }

    async fn tag_resource(
        &self,
        region: &Region,
        resource: &str,
        tags: &[Tag],
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::TagResource, region.as_str())?;
        state.calls.push(Call::TagResource {
            region: region.clone(),
            resource: resource.to_string(),
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn get_instance_state(
        &self,
        region: &Region,
        instance: &InstanceId,
    ) -> ProviderResult<InstanceState> {
        let mut state = self.begin(Operation::GetInstanceState, region.as_str())?;
        state.calls.push(Call::GetInstanceState {
            region: region.clone(),
            instance: instance.clone(),
        });
        let pending_polls = state.pending_polls;
        let polls = state.polls.entry(instance.clone()).or_insert(0);
        *polls += 1;
        let still_pending = match pending_polls {
            PendingPolls::Forever => true,
            PendingPolls::Count(n) => *polls <= n,
        };
        Ok(if still_pending {
            InstanceState::Pending
        } else {
            InstanceState::Running
        })
    }

    async fn associate_public_address(
        &self,
        region: &Region,
        instance: &InstanceId,
        allocation: &AllocationHandle,
    ) -> ProviderResult<()> {
        let mut state = self.begin(Operation::AssociateAddress, region.as_str())?;
        state.calls.push(Call::AssociateAddress {
            region: region.clone(),
            instance: instance.clone(),
            allocation: allocation.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl ArtifactResolver for SimulatedCloud {
    async fn latest_version(&self, _artifact_name: &str) -> ProviderResult<Option<String>> {
        let state = self.begin(Operation::LatestVersion, "global")?;
        Ok(state.artifact_version.clone())
    }
}

impl CertificateIssuer for SimulatedCloud {
    fn issue(&self, cluster_name: &str) -> ProviderResult<KeyMaterial> {
        let _state = self.begin(Operation::IssueCertificate, "global")?;
        Ok(KeyMaterial {
            keystore: format!("keystore:{}", cluster_name).into_bytes(),
            truststore: format!("truststore:{}", cluster_name).into_bytes(),
        })
    }
}
