//! Topology helpers built on petgraph.
//!
//! The case tables are flat, so a throwaway undirected graph is assembled on
//! demand: one node per non-isolated bus, one edge per in-service branch. The
//! main consumer is contingency screening, where an outage that splits the
//! grid into islands leaves part of the network without an angle reference.

use crate::{BusId, BusType, GatError, GatResult, Network};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};

/// Build the bus graph, optionally skipping one branch (by position).
fn bus_graph(network: &Network, skip_branch: Option<usize>) -> GatResult<UnGraph<usize, usize>> {
    let index = network.bus_index_map();
    let mut graph = UnGraph::<usize, usize>::with_capacity(network.buses.len(), network.branches.len());
    let mut nodes = vec![None; network.buses.len()];
    for (idx, bus) in network.buses.iter().enumerate() {
        if bus.bus_type != BusType::Isolated {
            nodes[idx] = Some(graph.add_node(idx));
        }
    }

    let lookup = |bus_id: BusId| -> GatResult<Option<NodeIndex>> {
        let idx = index.get(&bus_id).ok_or_else(|| {
            GatError::Network(format!("branch references unknown bus {}", bus_id.value()))
        })?;
        Ok(nodes[*idx])
    };

    for (pos, branch) in network.branches.iter().enumerate() {
        if !branch.status || Some(pos) == skip_branch {
            continue;
        }
        if let (Some(a), Some(b)) = (lookup(branch.from_bus)?, lookup(branch.to_bus)?) {
            graph.add_edge(a, b, pos);
        }
    }
    Ok(graph)
}

/// Number of electrical islands among non-isolated buses.
pub fn island_count(network: &Network) -> GatResult<usize> {
    Ok(connected_components(&bus_graph(network, None)?))
}

/// Number of islands after taking the branch at position `branch` out of service.
pub fn outage_islands(network: &Network, branch: usize) -> GatResult<usize> {
    if branch >= network.branches.len() {
        return Err(GatError::Network(format!(
            "branch position {} out of range ({} branches)",
            branch,
            network.branches.len()
        )));
    }
    Ok(connected_components(&bus_graph(network, Some(branch))?))
}

/// Positions of in-service branches whose outage increases the island count.
pub fn radial_branches(network: &Network) -> GatResult<Vec<usize>> {
    let base = island_count(network)?;
    let mut radial = Vec::new();
    for (pos, branch) in network.branches.iter().enumerate() {
        if branch.status && outage_islands(network, pos)? > base {
            radial.push(pos);
        }
    }
    Ok(radial)
}
