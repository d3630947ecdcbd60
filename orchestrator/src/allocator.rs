use ipnet::{Ipv4AddrRange, Ipv4Net};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use tracing::{debug, info};

use crate::config::AllocationPlan;
use crate::error::{ProvisionError, Result};
use crate::ledger::Ledger;
use crate::provider::AddressPool;
use crate::types::{NodeAddress, Region, Subnet};

/// Walks the host addresses of one subnet, past the reserved head
pub struct SubnetCursor {
    cidr: Ipv4Net,
    hosts: Ipv4AddrRange,
}

impl SubnetCursor {
    /// The provider keeps the lowest addresses of every subnet for its own
    /// system instances; they never show up as in use, so skip them.
    pub fn new(cidr: Ipv4Net, reserved: usize) -> Result<Self> {
        let mut cursor = Self {
            cidr,
            hosts: cidr.hosts(),
        };
        for _ in 0..reserved {
            cursor.next_address()?;
        }
        Ok(cursor)
    }

    pub fn next_address(&mut self) -> Result<Ipv4Addr> {
        self.hosts
            .next()
            .ok_or(ProvisionError::PoolDepleted { cidr: self.cidr })
    }
}

/// Hands out conflict-free private addresses, round-robin across the
/// subnets of each region
pub struct AddressAllocator {
    plan: AllocationPlan,
    handed_out: HashSet<Ipv4Addr>,
}

impl AddressAllocator {
    pub fn new(plan: AllocationPlan) -> Self {
        Self {
            plan,
            handed_out: HashSet::new(),
        }
    }

    /// Allocate `plan.count` addresses for `region`. Node `i` is placed in
    /// subnet `i % subnets.len()`. In public-facing mode every node also gets
    /// a routable address, recorded in `ledger` as soon as it is allocated.
    pub async fn allocate_region<P>(
        &mut self,
        pool: &P,
        region: &Region,
        subnets: &[Subnet],
        ledger: &mut Ledger,
    ) -> Result<Vec<NodeAddress>>
    where
        P: AddressPool + ?Sized,
    {
        if subnets.is_empty() {
            return Err(ProvisionError::resolution("subnets", region));
        }

        info!("Allocating IP addresses in {}..", region);

        let mut cursors = subnets
            .iter()
            .map(|s| SubnetCursor::new(s.cidr_block, self.plan.reserved))
            .collect::<Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(self.plan.count);
        while nodes.len() < self.plan.count {
            let idx = nodes.len() % cursors.len();
            let address = cursors[idx].next_address()?;

            if self.handed_out.contains(&address) {
                continue;
            }
            if pool.is_private_address_in_use(region, address).await? {
                debug!("Address {} is already taken in {}", address, region);
                continue;
            }

            self.handed_out.insert(address);
            nodes.push(NodeAddress::private(address));
        }

        if self.plan.public_facing {
            for node in &mut nodes {
                let (public_ip, allocation) = pool.allocate_routable_address(region).await?;
                ledger.record_address(region.clone(), allocation.clone());
                debug!("Allocated public IP {} for {}", public_ip, node.private_ip);
                node.public_ip = Some(public_ip);
                node.allocation = Some(allocation);
            }
        }

        Ok(nodes)
    }
}
