use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;

use super::error::FlowResult;
use crate::domain::{InterconnectorRecord, IntervalRecord, Network};
use crate::repo::{FlowStore, StoreError};

/// Raw telemetry for one local trading day
#[derive(Debug, Clone, Default)]
pub struct DayIntervals {
    pub generation: Vec<IntervalRecord>,
    pub interconnectors: Vec<InterconnectorRecord>,
}

/// Run a storage call under a deadline; expiry counts as a failed query
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit.as_secs())),
    }
}

/// Load generation and interconnector telemetry for `[day 00:00, day+1 00:00)`
/// in the network's local time. Either query failing fails the load.
pub async fn load_day<S: FlowStore + ?Sized>(
    store: &S,
    network: Network,
    day: NaiveDate,
    timeout: Duration,
) -> FlowResult<DayIntervals> {
    let (start, end) = network.day_window(day);
    let offset = network.fixed_offset();

    let generation = with_timeout(timeout, store.load_generation_intervals(network, start, end))
        .await?
        .into_iter()
        .map(|mut r| {
            r.trading_interval = r.trading_interval.with_timezone(&offset);
            r
        })
        .collect::<Vec<_>>();

    let interconnectors =
        with_timeout(timeout, store.load_interconnector_intervals(network, start, end))
            .await?
            .into_iter()
            .map(|mut r| {
                r.trading_interval = r.trading_interval.with_timezone(&offset);
                r
            })
            .collect::<Vec<_>>();

    debug!(
        %day,
        generation = generation.len(),
        interconnectors = interconnectors.len(),
        "loaded day intervals"
    );

    Ok(DayIntervals {
        generation,
        interconnectors,
    })
}
