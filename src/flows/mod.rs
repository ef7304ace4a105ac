//! Network emission-flow engine
//!
//! Per 5-minute interval: reconcile interconnector telemetry into directed
//! flows, back-calculate regional demand, assemble the flow balance system
//! for the fixed NEM topology and solve it for the cross-border emission
//! flows. Per day: aggregate the solved intervals into imports/exports for
//! every region.

pub mod aggregate;
pub mod balance;
pub mod error;
pub mod interconnector;
pub mod interval;
pub mod loader;
pub mod solver;
pub mod topology;

pub use aggregate::{aggregate_day, ImportExport};
pub use balance::{build_system, FlowBalanceSystem, IntervalInputs};
pub use error::{FlowError, FlowResult};
pub use interconnector::{reconcile, FlowMap, RegionFlow};
pub use interval::{calculate_emission_flows, solve_interval, DaySolutions, IntervalSolution};
pub use loader::{load_day, DayIntervals};
pub use solver::{demand, solve};
pub use topology::{Edge, Topology, NEM_TOPOLOGY};
