use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use tracing::{debug, trace, warn};

use super::balance::{
    build_system, radial_emission_flows, solved_emission_flows, IntervalInputs,
};
use super::error::{FlowError, FlowResult};
use super::interconnector::{reconcile, FlowMap, RegionFlow};
use super::solver::{demand, solve};
use super::topology::Topology;
use crate::domain::{InterconnectorRecord, IntervalRecord, NetworkRegion};

/// Solved flows for one dispatch interval
#[derive(Debug, Clone)]
pub struct IntervalSolution {
    pub trading_interval: DateTime<FixedOffset>,
    /// Emission flow per directed edge (tCO2-e)
    pub emission_flows: Vec<RegionFlow>,
    /// Reconciled physical flow per directed edge (MW)
    pub energy_flows: Vec<RegionFlow>,
    /// Back-calculated demand (MW)
    pub demand: BTreeMap<NetworkRegion, f64>,
}

/// Every solved interval of a day plus the ones that were dropped
#[derive(Debug, Clone, Default)]
pub struct DaySolutions {
    pub solutions: Vec<IntervalSolution>,
    pub skipped: Vec<DateTime<FixedOffset>>,
}

impl DaySolutions {
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

/// Sum one interval's generation records into region totals
pub fn interval_inputs(
    trading_interval: DateTime<FixedOffset>,
    generation: &[&IntervalRecord],
    interconnectors: &[&InterconnectorRecord],
) -> IntervalInputs {
    let mut power = BTreeMap::new();
    let mut emissions = BTreeMap::new();

    for record in generation {
        *power.entry(record.network_region).or_insert(0.0) += record.power;
        *emissions.entry(record.network_region).or_insert(0.0) += record.emissions;
    }

    IntervalInputs {
        trading_interval,
        generation: power,
        emissions,
        flows: FlowMap::from_flows(&reconcile(interconnectors)),
    }
}

/// Build and solve the flow balance for one interval
pub fn solve_interval(topology: &Topology, inputs: &IntervalInputs) -> FlowResult<IntervalSolution> {
    let demand = demand(topology, inputs)?;
    let radial = radial_emission_flows(topology, inputs);
    let system = build_system(topology, inputs, &demand, &radial);
    trace!(
        interval = %inputs.trading_interval,
        dimension = system.constants.len(),
        "built flow balance system"
    );

    let solution = solve(&system.coefficients, &system.constants).ok_or(FlowError::Singular {
        interval: inputs.trading_interval,
    })?;

    let mut emission_flows = solved_emission_flows(topology, &solution);
    emission_flows.extend(radial);

    let energy_flows = topology
        .directed_edges()
        .map(|edge| RegionFlow::new(edge.from, edge.to, inputs.flows.get(edge.from, edge.to)))
        .collect();

    debug!(
        interval = %inputs.trading_interval,
        demand = ?demand,
        "solved interval"
    );

    Ok(IntervalSolution {
        trading_interval: inputs.trading_interval,
        emission_flows,
        energy_flows,
        demand,
    })
}

/// Solve every interval present in the generation data.
///
/// Intervals that fail demand back-calculation or the linear solve are logged
/// and skipped; the rest of the day carries on.
pub fn calculate_emission_flows(
    topology: &Topology,
    generation: &[IntervalRecord],
    interconnectors: &[InterconnectorRecord],
) -> DaySolutions {
    let generation_by_interval: BTreeMap<_, Vec<&IntervalRecord>> = generation
        .iter()
        .into_group_map_by(|r| r.trading_interval)
        .into_iter()
        .collect();
    let interconnectors_by_interval = interconnectors
        .iter()
        .into_group_map_by(|r| r.trading_interval);

    let mut day = DaySolutions::default();

    for (interval, records) in generation_by_interval {
        let links = interconnectors_by_interval
            .get(&interval)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let inputs = interval_inputs(interval, &records, links);

        match solve_interval(topology, &inputs) {
            Ok(solution) => day.solutions.push(solution),
            Err(e) => {
                warn!(interval = %interval, error = %e, "skipping interval");
                day.skipped.push(interval);
            }
        }
    }

    day
}
