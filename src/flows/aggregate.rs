//! Day-level aggregation of per-interval flows
//!
//! Emissions and energy are split the same way: an edge's value counts as an
//! export of its source region and an import of its destination region. The
//! two sides are joined per region; a region missing from either side has no
//! row.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::error::{FlowError, FlowResult};
use super::interconnector::RegionFlow;
use super::interval::DaySolutions;
use crate::domain::{DailyRegionFlows, Network, NetworkRegion};

/// Imports and exports for one region
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImportExport {
    pub imports: f64,
    pub exports: f64,
}

/// Group-sum directed flows by source (exports) and destination (imports)
pub fn split_imports_exports<'a>(
    flows: impl IntoIterator<Item = &'a RegionFlow>,
) -> BTreeMap<NetworkRegion, ImportExport> {
    let mut totals: BTreeMap<NetworkRegion, ImportExport> = BTreeMap::new();
    for flow in flows {
        totals.entry(flow.from).or_default().exports += flow.value;
        totals.entry(flow.to).or_default().imports += flow.value;
    }
    totals
}

/// Daily emission imports/exports (tCO2-e)
pub fn emission_totals(day: &DaySolutions) -> BTreeMap<NetworkRegion, ImportExport> {
    split_imports_exports(day.solutions.iter().flat_map(|s| s.emission_flows.iter()))
}

/// Daily energy imports/exports (MWh), from MW flows over the solved intervals
pub fn energy_totals(day: &DaySolutions, network: Network) -> BTreeMap<NetworkRegion, ImportExport> {
    let scale = network.intervals_per_hour();
    split_imports_exports(day.solutions.iter().flat_map(|s| s.energy_flows.iter()))
        .into_iter()
        .map(|(region, totals)| {
            (
                region,
                ImportExport {
                    imports: totals.imports / scale,
                    exports: totals.exports / scale,
                },
            )
        })
        .collect()
}

/// Join emissions and energy into one row per region for the day
pub fn aggregate_day(
    day: NaiveDate,
    network: Network,
    solutions: &DaySolutions,
) -> FlowResult<Vec<DailyRegionFlows>> {
    if solutions.is_empty() {
        return Err(FlowError::AggregationEmpty { day });
    }

    let emissions = emission_totals(solutions);
    let energy = energy_totals(solutions, network);
    let trading_interval = network.day_start(day);

    let rows: Vec<DailyRegionFlows> = emissions
        .iter()
        .filter_map(|(region, em)| {
            energy.get(region).map(|en| DailyRegionFlows {
                trading_interval,
                network_id: network.code().to_string(),
                network_region: *region,
                energy_imports: en.imports,
                energy_exports: en.exports,
                emissions_imports: em.imports,
                emissions_exports: em.exports,
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(FlowError::AggregationEmpty { day });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::interval::IntervalSolution;
    use chrono::{DateTime, Duration};
    use NetworkRegion::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn solution(minutes: i64, emission: Vec<RegionFlow>, energy: Vec<RegionFlow>) -> IntervalSolution {
        IntervalSolution {
            trading_interval: DateTime::parse_from_rfc3339("2024-03-01T00:05:00+10:00").unwrap()
                + Duration::minutes(minutes),
            emission_flows: emission,
            energy_flows: energy,
            demand: BTreeMap::new(),
        }
    }

    #[test]
    fn test_split_credits_both_ends() {
        let flows = [
            RegionFlow::new(Vic1, Nsw1, 10.0),
            RegionFlow::new(Vic1, Sa1, 5.0),
            RegionFlow::new(Tas1, Vic1, 2.0),
        ];
        let totals = split_imports_exports(flows.iter());

        assert_eq!(totals[&Vic1], ImportExport { imports: 2.0, exports: 15.0 });
        assert_eq!(totals[&Nsw1], ImportExport { imports: 10.0, exports: 0.0 });
        assert_eq!(totals[&Tas1], ImportExport { imports: 0.0, exports: 2.0 });
    }

    #[test]
    fn test_energy_is_converted_to_mwh() {
        let solutions = DaySolutions {
            solutions: (0..12)
                .map(|i| solution(i * 5, vec![], vec![RegionFlow::new(Qld1, Nsw1, 600.0)]))
                .collect(),
            skipped: vec![],
        };
        let energy = energy_totals(&solutions, Network::Nem);

        // 600 MW for an hour
        assert_eq!(energy[&Qld1].exports, 600.0);
        assert_eq!(energy[&Nsw1].imports, 600.0);
    }

    #[test]
    fn test_aggregate_day_joins_sides() {
        let solutions = DaySolutions {
            solutions: vec![
                solution(
                    0,
                    vec![RegionFlow::new(Vic1, Sa1, 3.0), RegionFlow::new(Sa1, Vic1, 0.0)],
                    vec![RegionFlow::new(Vic1, Sa1, 120.0), RegionFlow::new(Sa1, Vic1, 0.0)],
                ),
                solution(
                    5,
                    vec![RegionFlow::new(Vic1, Sa1, 1.0), RegionFlow::new(Sa1, Vic1, 0.0)],
                    vec![RegionFlow::new(Vic1, Sa1, 60.0), RegionFlow::new(Sa1, Vic1, 0.0)],
                ),
            ],
            skipped: vec![],
        };
        let rows = aggregate_day(day(), Network::Nem, &solutions).unwrap();

        assert_eq!(rows.len(), 2);
        let sa = rows.iter().find(|r| r.network_region == Sa1).unwrap();
        assert_eq!(sa.emissions_imports, 4.0);
        assert_eq!(sa.emissions_exports, 0.0);
        assert_eq!(sa.energy_imports, 15.0);
        assert_eq!(sa.network_id, "NEM");
        assert_eq!(sa.trading_interval, Network::Nem.day_start(day()));
    }

    #[test]
    fn test_one_sided_region_is_dropped() {
        let solutions = DaySolutions {
            solutions: vec![solution(
                0,
                vec![RegionFlow::new(Tas1, Vic1, 3.0)],
                vec![RegionFlow::new(Qld1, Nsw1, 100.0)],
            )],
            skipped: vec![],
        };
        let err = aggregate_day(day(), Network::Nem, &solutions).unwrap_err();
        assert!(matches!(err, FlowError::AggregationEmpty { .. }));
    }

    #[test]
    fn test_no_solutions_is_empty() {
        let solutions = DaySolutions {
            solutions: vec![],
            skipped: vec![DateTime::parse_from_rfc3339("2024-03-01T00:05:00+10:00").unwrap()],
        };
        assert!(matches!(
            aggregate_day(day(), Network::Nem, &solutions),
            Err(FlowError::AggregationEmpty { .. })
        ));
    }
}
