//! Flow balance system assembly
//!
//! Unknowns are one emissions total per region followed by one emission flow
//! per solved edge, in [`Topology`] order. Each region contributes a
//! conservation row and each solved edge an intensity row:
//!
//! ```text
//! x_r - sum(x_e for solved e into r) + sum(x_e for solved e out of r)
//!     = E_r - sum(radial out of r) + sum(radial into r)
//! x_e - x_from * P(e) / D(from) = 0
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

use super::interconnector::{FlowMap, RegionFlow};
use super::topology::{Edge, Topology};
use crate::domain::NetworkRegion;

/// Per-region totals and reconciled interconnector flows for one interval
#[derive(Debug, Clone)]
pub struct IntervalInputs {
    pub trading_interval: DateTime<FixedOffset>,
    /// Generation by region (MW)
    pub generation: BTreeMap<NetworkRegion, f64>,
    /// Generation emissions by region (tCO2-e)
    pub emissions: BTreeMap<NetworkRegion, f64>,
    /// Reconciled interconnector flows (MW)
    pub flows: FlowMap,
}

impl IntervalInputs {
    pub fn generation(&self, region: NetworkRegion) -> Option<f64> {
        self.generation.get(&region).copied()
    }

    pub fn emissions(&self, region: NetworkRegion) -> f64 {
        self.emissions.get(&region).copied().unwrap_or(0.0)
    }
}

/// Dense linear system for one interval
#[derive(Debug, Clone)]
pub struct FlowBalanceSystem {
    pub coefficients: DMatrix<f64>,
    pub constants: DVector<f64>,
}

/// Division used for every flow share in the model.
///
/// `0 / 0` (no flow out of a region with no demand) is defined as zero. Any
/// other division by zero is left non-finite so the solve rejects the
/// interval instead of silently dropping a flow.
pub fn flow_share(numerator: f64, denominator: f64, what: &str) -> f64 {
    let share = numerator / denominator;
    if share.is_nan() {
        debug!(what, numerator, denominator, "coercing NaN flow share to zero");
        return 0.0;
    }
    share
}

fn coerce_nan(value: f64, what: &str) -> f64 {
    if value.is_nan() {
        debug!(what, "coercing NaN constant to zero");
        0.0
    } else {
        value
    }
}

/// Emission flows on radial edges, taken straight from the exporting
/// region's own generation: local emissions scaled by the share of local
/// generation sent over the link.
pub fn radial_emission_flows(topology: &Topology, inputs: &IntervalInputs) -> Vec<RegionFlow> {
    topology
        .radial_edges
        .iter()
        .map(|edge| {
            let exported = inputs.flows.get(edge.from, edge.to);
            let generated = inputs.generation(edge.from).unwrap_or(0.0);
            let share = flow_share(exported, generated, "radial export share");
            RegionFlow::new(edge.from, edge.to, inputs.emissions(edge.from) * share)
        })
        .collect()
}

/// Assemble the coefficient matrix and constant vector
pub fn build_system(
    topology: &Topology,
    inputs: &IntervalInputs,
    demand: &BTreeMap<NetworkRegion, f64>,
    radial: &[RegionFlow],
) -> FlowBalanceSystem {
    let n = topology.dimension();
    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut b = DVector::<f64>::zeros(n);
    let radial = FlowMap::from_flows(radial);

    // conservation
    for (row, &region) in topology.regions.iter().enumerate() {
        a[(row, row)] = 1.0;

        for edge in topology.solved_edges {
            let Some(col) = topology.edge_index(*edge) else {
                continue;
            };
            if edge.to == region {
                a[(row, col)] = -1.0;
            } else if edge.from == region {
                a[(row, col)] = 1.0;
            }
        }

        let mut constant = inputs.emissions(region);
        for edge in topology.radial_edges {
            if edge.from == region {
                constant -= radial.get(edge.from, edge.to);
            } else if edge.to == region {
                constant += radial.get(edge.from, edge.to);
            }
        }
        b[row] = coerce_nan(constant, "regional emissions balance");
    }

    // intensity
    for (offset, edge) in topology.solved_edges.iter().enumerate() {
        let row = topology.regions.len() + offset;
        let Some(from_col) = topology.region_index(edge.from) else {
            continue;
        };
        let region_demand = demand.get(&edge.from).copied().unwrap_or(0.0);
        let share = flow_share(
            inputs.flows.get(edge.from, edge.to),
            region_demand,
            "edge intensity share",
        );

        a[(row, row)] = 1.0;
        a[(row, from_col)] = -share;
    }

    FlowBalanceSystem {
        coefficients: a,
        constants: b,
    }
}

/// Read the solved edge flows back out of a solution vector
pub fn solved_emission_flows(topology: &Topology, solution: &DVector<f64>) -> Vec<RegionFlow> {
    topology
        .solved_edges
        .iter()
        .filter_map(|edge: &Edge| {
            topology
                .edge_index(*edge)
                .map(|col| RegionFlow::new(edge.from, edge.to, solution[col]))
        })
        .collect()
}
