use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use super::balance::IntervalInputs;
use super::error::{FlowError, FlowResult};
use super::topology::Topology;
use crate::domain::NetworkRegion;

/// Back-calculate regional demand from generation and interconnector flows.
///
/// `demand(r) = generation(r) + sum(flow into r) - sum(flow out of r)` over
/// every link touching `r`. Every region in the topology must have a
/// generation total; links without telemetry count as zero flow.
pub fn demand(
    topology: &Topology,
    inputs: &IntervalInputs,
) -> FlowResult<BTreeMap<NetworkRegion, f64>> {
    let mut demand = BTreeMap::new();

    for &region in topology.regions {
        let generation = inputs
            .generation(region)
            .ok_or(FlowError::DemandBalance {
                interval: inputs.trading_interval,
                region,
            })?;
        demand.insert(region, generation);
    }

    for edge in topology.directed_edges() {
        let flow = inputs.flows.get(edge.from, edge.to);
        if let Some(d) = demand.get_mut(&edge.to) {
            *d += flow;
        }
        if let Some(d) = demand.get_mut(&edge.from) {
            *d -= flow;
        }
    }

    Ok(demand)
}

/// Dense LU solve of `a * x = b`.
///
/// Returns `None` when the system has non-finite coefficients, is singular,
/// or produces a non-finite solution.
pub fn solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if !a.is_square() || a.nrows() != b.len() {
        return None;
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let x = a.clone().lu().solve(b)?;

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::interconnector::{FlowMap, RegionFlow};
    use crate::flows::topology::NEM_TOPOLOGY;
    use chrono::DateTime;
    use NetworkRegion::*;

    fn inputs(generation: &[(NetworkRegion, f64)], flows: &[RegionFlow]) -> IntervalInputs {
        IntervalInputs {
            trading_interval: DateTime::parse_from_rfc3339("2024-03-01T12:00:00+10:00").unwrap(),
            generation: generation.iter().copied().collect(),
            emissions: BTreeMap::new(),
            flows: FlowMap::from_flows(flows),
        }
    }

    #[test]
    fn test_demand_balance_identity() {
        let inputs = inputs(
            &[(Nsw1, 7000.0), (Qld1, 6000.0), (Sa1, 1200.0), (Tas1, 1000.0), (Vic1, 5000.0)],
            &[
                RegionFlow::new(Qld1, Nsw1, 800.0),
                RegionFlow::new(Nsw1, Qld1, 0.0),
                RegionFlow::new(Vic1, Nsw1, 300.0),
                RegionFlow::new(Nsw1, Vic1, 0.0),
                RegionFlow::new(Vic1, Sa1, 0.0),
                RegionFlow::new(Sa1, Vic1, 150.0),
                RegionFlow::new(Tas1, Vic1, 0.0),
                RegionFlow::new(Vic1, Tas1, 400.0),
            ],
        );
        let d = demand(&NEM_TOPOLOGY, &inputs).unwrap();

        assert_eq!(d[&Nsw1], 7000.0 + 800.0 + 300.0);
        assert_eq!(d[&Qld1], 6000.0 - 800.0);
        assert_eq!(d[&Sa1], 1200.0 - 150.0);
        assert_eq!(d[&Tas1], 1000.0 + 400.0);
        assert_eq!(d[&Vic1], 5000.0 - 300.0 + 150.0 - 400.0);

        let generation: f64 = inputs.generation.values().sum();
        let total: f64 = d.values().sum();
        assert_eq!(total, generation);
    }

    #[test]
    fn test_demand_requires_every_region() {
        let inputs = inputs(&[(Qld1, 6000.0), (Sa1, 1200.0), (Tas1, 1000.0), (Vic1, 5000.0)], &[]);
        let err = demand(&NEM_TOPOLOGY, &inputs).unwrap_err();
        assert!(matches!(err, FlowError::DemandBalance { region: Nsw1, .. }));
    }

    #[test]
    fn test_solve_known_system() {
        // Lower bidiagonal system with x = [1, 2, ..., 10]
        let n = 10;
        let mut a = DMatrix::<f64>::identity(n, n);
        for i in 1..n {
            a[(i, i - 1)] = -0.5;
        }
        a[(0, n - 1)] = 2.0;
        let expected = DVector::from_iterator(n, (1..=n).map(|v| v as f64));
        let b = &a * &expected;

        let x = solve(&a, &b).expect("system is regular");
        for i in 0..n {
            assert!((x[i] - expected[i]).abs() < 1e-9, "x[{i}] = {}", x[i]);
        }
    }

    #[test]
    fn test_solve_rejects_singular() {
        let mut a = DMatrix::<f64>::identity(10, 10);
        a[(3, 3)] = 0.0;
        let b = DVector::<f64>::from_element(10, 1.0);
        assert!(solve(&a, &b).is_none());
    }

    #[test]
    fn test_solve_rejects_non_finite() {
        let mut a = DMatrix::<f64>::identity(10, 10);
        a[(6, 3)] = f64::NEG_INFINITY;
        let b = DVector::<f64>::from_element(10, 1.0);
        assert!(solve(&a, &b).is_none());

        let a = DMatrix::<f64>::identity(10, 10);
        let mut b = DVector::<f64>::zeros(10);
        b[2] = f64::NAN;
        assert!(solve(&a, &b).is_none());
    }

    #[test]
    fn test_solve_rejects_mismatched_shapes() {
        let a = DMatrix::<f64>::identity(10, 10);
        let b = DVector::<f64>::zeros(9);
        assert!(solve(&a, &b).is_none());
    }
}
