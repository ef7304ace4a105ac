//! Interconnector flow reconciliation
//!
//! Telemetry arrives as one or more signed readings per physical link, tagged
//! with either orientation. Reconciliation nets them per undirected pair and
//! splits the result into two non-negative directed components.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::domain::{InterconnectorRecord, NetworkRegion};

/// Directed, non-negative flow between two regions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionFlow {
    pub from: NetworkRegion,
    pub to: NetworkRegion,
    pub value: f64,
}

impl RegionFlow {
    pub fn new(from: NetworkRegion, to: NetworkRegion, value: f64) -> Self {
        Self { from, to, value }
    }
}

/// Adjacency lookup over directed flows, built once per interval
#[derive(Debug, Clone, Default)]
pub struct FlowMap {
    edges: HashMap<(NetworkRegion, NetworkRegion), f64>,
}

impl FlowMap {
    pub fn from_flows(flows: &[RegionFlow]) -> Self {
        let mut edges = HashMap::with_capacity(flows.len());
        for flow in flows {
            *edges.entry((flow.from, flow.to)).or_insert(0.0) += flow.value;
        }
        Self { edges }
    }

    /// Flow on `from -> to`; links with no telemetry carry nothing
    pub fn get(&self, from: NetworkRegion, to: NetworkRegion) -> f64 {
        self.edges.get(&(from, to)).copied().unwrap_or(0.0)
    }

}

/// Net the readings of one interval into directed flows.
///
/// For each undirected pair `{a, b}` the net is `sum(a->b) - sum(b->a)`;
/// the positive part is credited to the direction it points in and the
/// opposite direction is clipped to zero. Both directions are always emitted.
pub fn reconcile(records: &[&InterconnectorRecord]) -> Vec<RegionFlow> {
    let mut net: HashMap<(NetworkRegion, NetworkRegion), f64> = HashMap::new();

    for record in records {
        if record.region_from == record.region_to {
            continue;
        }
        let (a, b, sign) = if record.region_from < record.region_to {
            (record.region_from, record.region_to, 1.0)
        } else {
            (record.region_to, record.region_from, -1.0)
        };
        *net.entry((a, b)).or_insert(0.0) += sign * record.generated;
    }

    net.into_iter()
        .sorted_by_key(|&(pair, _)| pair)
        .flat_map(|((a, b), value)| {
            [
                RegionFlow::new(a, b, value.max(0.0)),
                RegionFlow::new(b, a, (-value).max(0.0)),
            ]
        })
        .collect()
}
