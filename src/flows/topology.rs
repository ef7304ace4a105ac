//! Declarative description of the NEM interconnection graph.
//!
//! The flow balance model is not a general graph solver. It is written for
//! exactly this five-region grid: four physical links, three of which feed a
//! hub from a radial region whose export emissions are known up front. The
//! descriptor below is consumed by [`crate::flows::balance`] so the shape of
//! the model can be inspected and tested separately from the solve.

use crate::domain::{Network, NetworkRegion};
use NetworkRegion::*;

/// Directed edge of the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: NetworkRegion,
    pub to: NetworkRegion,
}

impl Edge {
    pub const fn new(from: NetworkRegion, to: NetworkRegion) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Topology {
    /// Regions in unknown order; one emissions total per region
    pub regions: &'static [NetworkRegion],
    /// Undirected physical links
    pub links: &'static [(NetworkRegion, NetworkRegion)],
    /// Edges whose emission flow is an unknown of the system
    pub solved_edges: &'static [Edge],
    /// Edges whose emission flow is computed directly from the exporting
    /// region's own generation
    pub radial_edges: &'static [Edge],
}

pub const NEM_TOPOLOGY: Topology = Topology {
    regions: &[Sa1, Qld1, Tas1, Nsw1, Vic1],
    links: &[(Nsw1, Qld1), (Nsw1, Vic1), (Sa1, Vic1), (Tas1, Vic1)],
    solved_edges: &[
        Edge::new(Vic1, Nsw1),
        Edge::new(Nsw1, Qld1),
        Edge::new(Nsw1, Vic1),
        Edge::new(Vic1, Sa1),
        Edge::new(Vic1, Tas1),
    ],
    radial_edges: &[
        Edge::new(Qld1, Nsw1),
        Edge::new(Sa1, Vic1),
        Edge::new(Tas1, Vic1),
    ],
};

impl Topology {
    pub fn for_network(network: Network) -> Option<&'static Topology> {
        match network {
            Network::Nem => Some(&NEM_TOPOLOGY),
            Network::Wem => None,
        }
    }

    /// Number of unknowns, equal to the number of equations
    pub fn dimension(&self) -> usize {
        self.regions.len() + self.solved_edges.len()
    }

    /// Column of a region's emissions total
    pub fn region_index(&self, region: NetworkRegion) -> Option<usize> {
        self.regions.iter().position(|r| *r == region)
    }

    /// Column of a solved edge's emission flow
    pub fn edge_index(&self, edge: Edge) -> Option<usize> {
        self.solved_edges
            .iter()
            .position(|e| *e == edge)
            .map(|i| self.regions.len() + i)
    }

    /// Every directed edge, both orientations of each link
    pub fn directed_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.links
            .iter()
            .flat_map(|&(a, b)| [Edge::new(a, b), Edge::new(b, a)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nem_system_is_square() {
        assert_eq!(NEM_TOPOLOGY.dimension(), 10);
        assert_eq!(NEM_TOPOLOGY.regions.len(), 5);
        assert_eq!(NEM_TOPOLOGY.solved_edges.len(), 5);
    }

    #[test]
    fn test_variable_order() {
        assert_eq!(NEM_TOPOLOGY.region_index(Sa1), Some(0));
        assert_eq!(NEM_TOPOLOGY.region_index(Vic1), Some(4));
        assert_eq!(NEM_TOPOLOGY.edge_index(Edge::new(Vic1, Nsw1)), Some(5));
        assert_eq!(NEM_TOPOLOGY.edge_index(Edge::new(Vic1, Tas1)), Some(9));
        assert_eq!(NEM_TOPOLOGY.edge_index(Edge::new(Qld1, Nsw1)), None);
    }

    #[test]
    fn test_every_direction_is_covered_once() {
        let directed: Vec<Edge> = NEM_TOPOLOGY.directed_edges().collect();
        let emission: Vec<Edge> = NEM_TOPOLOGY
            .solved_edges
            .iter()
            .chain(NEM_TOPOLOGY.radial_edges)
            .copied()
            .collect();
        assert_eq!(directed.len(), 8);
        assert_eq!(emission.len(), 8);
        for edge in directed {
            assert_eq!(emission.iter().filter(|e| **e == edge).count(), 1);
        }
    }

    #[test]
    fn test_radial_edges_leave_leaf_regions() {
        for edge in NEM_TOPOLOGY.radial_edges {
            let degree = NEM_TOPOLOGY
                .links
                .iter()
                .filter(|(a, b)| *a == edge.from || *b == edge.from)
                .count();
            assert_eq!(degree, 1, "{} is not a leaf", edge.from);
        }
    }

    #[test]
    fn test_wem_has_no_topology() {
        assert!(Topology::for_network(Network::Wem).is_none());
    }
}
