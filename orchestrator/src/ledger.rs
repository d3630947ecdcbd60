//! Compensation ledger and rollback.
//!
//! Every resource that must be undone on failure is appended to the ledger
//! the moment it is created. Rollback walks the ledger in reverse creation
//! order, issuing exactly one compensating call per entry.

use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::provider::{AccessControl, AddressPool};
use crate::types::{AccessGroupHandle, AllocationHandle, Region};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    AccessGroup(AccessGroupHandle),
    RoutableAddress(AllocationHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub region: Region,
    pub resource: Resource,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<Entry>,
}

/// Outcome of a compensation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationReport {
    pub compensated: usize,
    pub failed: Vec<Entry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_access_group(&mut self, region: Region, group: AccessGroupHandle) {
        self.entries.push(Entry {
            region,
            resource: Resource::AccessGroup(group),
        });
    }

    pub fn record_address(&mut self, region: Region, allocation: AllocationHandle) {
        self.entries.push(Entry {
            region,
            resource: Resource::RoutableAddress(allocation),
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-effort undo of everything recorded, newest first. Failures are
    /// logged and skipped, never retried.
    pub async fn compensate<P>(&self, provider: &P) -> CompensationReport
    where
        P: AccessControl + AddressPool + ?Sized,
    {
        let mut report = CompensationReport::default();

        for entry in self.entries.iter().rev() {
            let result = match &entry.resource {
                Resource::AccessGroup(group) => {
                    info!("Cleaning up security group: {} in {}", group, entry.region);
                    provider.delete_access_group(&entry.region, group).await
                }
                Resource::RoutableAddress(allocation) => {
                    info!("Releasing IP address: {} in {}", allocation, entry.region);
                    provider
                        .release_routable_address(&entry.region, allocation)
                        .await
                }
            };

            match result {
                Ok(()) => report.compensated += 1,
                Err(e) => {
                    warn!("Compensation failed, resource left behind: {}", e);
                    report.failed.push(entry.clone());
                }
            }
        }

        report
    }
}

/// Undo everything in `ledger`, then hand back the failure that caused it
pub async fn rollback<P>(provider: &P, ledger: &Ledger, error: ProvisionError) -> ProvisionError
where
    P: AccessControl + AddressPool + ?Sized,
{
    warn!("Provisioning failed: {}", error);

    if ledger.is_empty() {
        info!("Nothing to clean up");
        return error;
    }

    let report = ledger.compensate(provider).await;
    if report.failed.is_empty() {
        info!("Cleaned up {} resource(s)", report.compensated);
    } else {
        warn!(
            "Cleaned up {} resource(s), {} could not be removed and need manual cleanup",
            report.compensated,
            report.failed.len()
        );
    }

    error
}
