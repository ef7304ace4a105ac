pub mod network;
pub mod records;

pub use network::Network;
pub use records::{
    DailyRegionFlows, InterconnectorRecord, IntervalRecord, NetworkFlowRow, NetworkRegion,
    TableDescriptor, AGGREGATE_NETWORK_FLOWS,
};
