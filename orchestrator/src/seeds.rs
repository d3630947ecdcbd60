use tracing::info;

use crate::types::{NodeAddress, Topology};

/// Take the first `seed_count` addresses of every region as seed nodes.
/// Pure and order-preserving, so calling it twice gives the same answer.
pub fn pick_seed_nodes(topology: &Topology, seed_count: usize) -> Topology {
    let mut seeds = Topology::new();
    for (region, nodes) in topology.iter() {
        let region_seeds: Vec<NodeAddress> = nodes.iter().take(seed_count).cloned().collect();
        seeds.insert(region.clone(), region_seeds);
    }
    seeds
}

/// Log the seed selection the way operators expect to see it
pub fn announce_seed_nodes(seeds: &Topology) {
    for (region, nodes) in seeds.iter() {
        let list = nodes
            .iter()
            .map(|n| n.default_ip().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Our seed nodes in {} will be: {}", region, list);
    }
}
