use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

// ============================================================================
// Regions and Subnets
// ============================================================================

/// Identifier of an independent deployment region (e.g. `eu-central-1`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Region {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub subnet_id: String,
    pub availability_zone: String,
    pub cidr_block: Ipv4Net,
    /// Display name, used to tell `dmz-` subnets from `internal-` ones
    pub name: String,
}

// ============================================================================
// Node Addresses and Topology
// ============================================================================

/// Network identity of one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub private_ip: Ipv4Addr,
    pub public_ip: Option<Ipv4Addr>,
    pub allocation: Option<AllocationHandle>,
}

impl NodeAddress {
    pub fn private(private_ip: Ipv4Addr) -> Self {
        Self {
            private_ip,
            public_ip: None,
            allocation: None,
        }
    }

    /// Address other nodes use to reach this one: public when assigned,
    /// private otherwise.
    pub fn default_ip(&self) -> Ipv4Addr {
        self.public_ip.unwrap_or(self.private_ip)
    }

    /// Provider-internal DNS name of the private address
    pub fn private_hostname(&self, region: &Region) -> String {
        let octets = self.private_ip.octets();
        format!(
            "ip-{}-{}-{}-{}.{}.compute.internal.",
            octets[0], octets[1], octets[2], octets[3], region
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionNodes {
    pub region: Region,
    pub nodes: Vec<NodeAddress>,
}

/// Region -> ordered node addresses. Regions keep the operator-supplied
/// order and node position decides availability zone and role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    regions: Vec<RegionNodes>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: Region, nodes: Vec<NodeAddress>) {
        match self.regions.iter_mut().find(|r| r.region == region) {
            Some(existing) => existing.nodes = nodes,
            None => self.regions.push(RegionNodes { region, nodes }),
        }
    }

    pub fn get(&self, region: &Region) -> Option<&[NodeAddress]> {
        self.regions
            .iter()
            .find(|r| &r.region == region)
            .map(|r| r.nodes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Region, &[NodeAddress])> {
        self.regions.iter().map(|r| (&r.region, r.nodes.as_slice()))
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().map(|r| &r.region)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeAddress> {
        self.regions.iter().flat_map(|r| r.nodes.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }
}

// ============================================================================
// Opaque Resource Handles
// ============================================================================

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

handle!(
    /// Handle of an allocated routable (public) address
    AllocationHandle
);
handle!(AccessGroupHandle);
handle!(ProfileHandle);
handle!(AlarmTopicHandle);
handle!(ImageHandle);
handle!(ZoneHandle);
handle!(VolumeHandle);
handle!(InstanceId);

// ============================================================================
// Access Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// Members of the group the rule is attached to
    OwnGroup,
    Group(AccessGroupHandle),
    Cidr(Ipv4Net),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: Protocol,
    /// Inclusive port range, `None` for all ports
    pub ports: Option<(u16, u16)>,
    pub source: RuleSource,
}

// ============================================================================
// Compute
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub volume_type: String,
    pub size_gb: u32,
    pub iops: Option<u32>,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub image: ImageHandle,
    pub instance_type: String,
    pub subnet_id: String,
    pub private_ip: Ipv4Addr,
    pub access_group: AccessGroupHandle,
    pub profile: ProfileHandle,
    pub user_data: String,
    pub termination_protection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    /// Whether the instance is still initializing
    pub fn is_pending(self) -> bool {
        matches!(self, InstanceState::Pending)
    }
}

// ============================================================================
// DNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecordSet {
    pub name: String,
    pub ttl: u32,
    pub records: Vec<String>,
}

// ============================================================================
// Certificates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub keystore: Vec<u8>,
    pub truststore: Vec<u8>,
}
