use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

use crate::domain::{Network, NetworkRegion};
use crate::repo::StoreError;

/// Errors raised by the emission-flow pipeline
#[derive(Debug, Error)]
pub enum FlowError {
    /// Interval data could not be loaded; aborts the day
    #[error("Data load failed: {0}")]
    DataLoad(#[from] StoreError),

    /// Demand cannot be back-calculated without a region's generation
    #[error("Missing generation for {region} at {interval}")]
    DemandBalance {
        interval: DateTime<FixedOffset>,
        region: NetworkRegion,
    },

    /// Flow balance system has no unique solution
    #[error("Singular flow balance system at {interval}")]
    Singular { interval: DateTime<FixedOffset> },

    /// No solved intervals, or the emissions/energy merge was empty
    #[error("No flow results for {day}")]
    AggregationEmpty { day: NaiveDate },

    #[error("No flow topology defined for network {0}")]
    UnsupportedNetwork(Network),
}

pub type FlowResult<T> = Result<T, FlowError>;
