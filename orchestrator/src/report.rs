//! Operator-facing messages printed at the end of a run.

use std::fmt;

use crate::config::CLIENT_PORT;
use crate::launcher::{LaunchedNode, NodeRole};
use crate::provisioners::DockerImage;
use crate::types::{Region, Topology};

/// Result of a successful provisioning run
#[derive(Clone)]
pub struct ProvisionReport {
    pub cluster_name: String,
    pub cluster_size: usize,
    pub regions: Vec<Region>,
    pub image: DockerImage,
    pub topology: Topology,
    pub seeds: Topology,
    pub nodes: Vec<LaunchedNode>,
    pub admin_password: String,
}

impl ProvisionReport {
    pub fn seed_nodes(&self) -> impl Iterator<Item = &LaunchedNode> {
        self.nodes.iter().filter(|n| n.role == NodeRole::Seed)
    }
}

impl fmt::Debug for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionReport")
            .field("cluster_name", &self.cluster_name)
            .field("cluster_size", &self.cluster_size)
            .field("regions", &self.regions)
            .field("image", &self.image)
            .field("topology", &self.topology)
            .field("seeds", &self.seeds)
            .field("nodes", &self.nodes)
            .field("admin_password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions = self
            .regions
            .iter()
            .map(Region::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        writeln!(f)?;
        writeln!(
            f,
            "The Cassandra cluster {} was created with {} nodes",
            self.cluster_name, self.cluster_size
        )?;
        writeln!(f, "in each of the following regions: {}", regions)?;
        writeln!(f)?;
        writeln!(f, "Log in to any node with the superuser account from inside")?;
        writeln!(f, "the docker container:")?;
        writeln!(f)?;
        writeln!(f, "(docker)$ cqlsh -u admin -p $ADMIN_PASSWORD")?;
        writeln!(f)?;
        writeln!(f, "and create non-superuser roles from there.")?;
        writeln!(f)?;
        writeln!(
            f,
            "The security groups named {} (in all regions) may need extra rules",
            self.cluster_name
        )?;
        writeln!(
            f,
            "to let your application reach Cassandra on port {}, and your",
            CLIENT_PORT
        )?;
        writeln!(
            f,
            "monitoring reach Jolokia (8778) or the node exporter (9100)."
        )
    }
}

/// Printed to stderr before the underlying error
pub fn failure_notice() -> &'static str {
    "
Deploying Plan B Cassandra has failed :-(

A common cause is that private IP addresses picked for the new instances
were taken by other instances while the run was in progress. If so,
retrying should help (clean up what is left of this attempt first).

Check the error below, then either fix its cause or retry.
"
}
