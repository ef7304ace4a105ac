//! Day-range orchestration of the emission-flow pipeline
//!
//! Each day runs load -> build/solve per interval -> aggregate -> persist on
//! its own, with no state carried between days. Persistence happens once per
//! day after aggregation, and cancellation is only honoured between days, so
//! a day is never half written.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::domain::{DailyRegionFlows, Network, NetworkFlowRow, AGGREGATE_NETWORK_FLOWS};
use crate::flows::{
    aggregate_day, calculate_emission_flows, load_day, FlowError, FlowResult, Topology,
};
use crate::flows::loader::with_timeout;
use crate::repo::{FlowStore, StoreError};

/// Pipeline stage of a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DayStage {
    Pending,
    Loaded,
    Solved,
    Aggregated,
    Persisted,
    /// Aggregated but not written
    DryRun,
    Skipped,
    Failed,
}

/// Terminal state of a single day
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Persisted { rows: u64 },
    /// Aggregated but not written
    DryRun { rows: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl DayOutcome {
    pub fn stage(&self) -> DayStage {
        match self {
            DayOutcome::Persisted { .. } => DayStage::Persisted,
            DayOutcome::DryRun { .. } => DayStage::DryRun,
            DayOutcome::Skipped { .. } => DayStage::Skipped,
            DayOutcome::Failed { .. } => DayStage::Failed,
        }
    }
}

/// Result of a multi-day run
#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub outcomes: Vec<(NaiveDate, DayOutcome)>,
    pub rows_written: u64,
    pub cancelled: bool,
}

impl BackfillSummary {
    fn record(&mut self, day: NaiveDate, outcome: DayOutcome) {
        if let DayOutcome::Persisted { rows } = outcome {
            self.rows_written += rows;
        }
        self.outcomes.push((day, outcome));
    }

    fn count(&self, stage: DayStage) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.stage() == stage)
            .count()
    }

    pub fn days_persisted(&self) -> usize {
        self.count(DayStage::Persisted)
    }

    pub fn days_dry_run(&self) -> usize {
        self.count(DayStage::DryRun)
    }

    pub fn days_skipped(&self) -> usize {
        self.count(DayStage::Skipped)
    }

    pub fn days_failed(&self) -> usize {
        self.count(DayStage::Failed)
    }
}

/// Runs and stores network emission flows
pub struct EmissionFlowWorker {
    store: Arc<dyn FlowStore>,
    network: Network,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl EmissionFlowWorker {
    pub fn new(store: Arc<dyn FlowStore>, network: Network, config: WorkerConfig) -> Self {
        Self {
            store,
            network,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between days when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Compute the per-region imports/exports for one day
    pub async fn calc_day(&self, day: NaiveDate) -> FlowResult<Vec<DailyRegionFlows>> {
        let topology =
            Topology::for_network(self.network).ok_or(FlowError::UnsupportedNetwork(self.network))?;

        let intervals = load_day(
            self.store.as_ref(),
            self.network,
            day,
            self.config.query_timeout(),
        )
        .await?;
        debug!(%day, stage = %DayStage::Loaded, generation = intervals.generation.len());

        let solutions =
            calculate_emission_flows(topology, &intervals.generation, &intervals.interconnectors);
        debug!(
            %day,
            stage = %DayStage::Solved,
            solved = solutions.solutions.len(),
            skipped = solutions.skipped.len()
        );

        let rows = aggregate_day(day, self.network, &solutions)?;
        debug!(%day, stage = %DayStage::Aggregated, rows = rows.len());

        Ok(rows)
    }

    async fn persist(&self, rows: &[NetworkFlowRow]) -> Result<u64, StoreError> {
        with_timeout(
            self.config.query_timeout(),
            self.store.bulk_upsert(&AGGREGATE_NETWORK_FLOWS, rows),
        )
        .await
    }

    /// Attach audit metadata and bulk upsert. Failures are logged and
    /// reported as zero rows written.
    pub async fn insert_flows(&self, flows: Vec<DailyRegionFlows>) -> u64 {
        self.try_insert_flows(flows).await.unwrap_or(0)
    }

    async fn try_insert_flows(&self, flows: Vec<DailyRegionFlows>) -> Result<u64, StoreError> {
        if flows.is_empty() {
            error!("No records returned from flow aggregation");
            return Ok(0);
        }

        let now = Utc::now();
        let rows: Vec<NetworkFlowRow> = flows
            .into_iter()
            .map(|f| NetworkFlowRow::from_daily(f, &self.config.created_by, now))
            .collect();

        match self.persist(&rows).await {
            Ok(written) => {
                info!("Inserted {} records", written);
                Ok(written)
            }
            Err(e) => {
                error!("Error inserting records: {}", e);
                Err(e)
            }
        }
    }

    /// Compute and store one day
    pub async fn run_and_store_emission_flows(&self, day: NaiveDate) -> DayOutcome {
        debug!(%day, stage = %DayStage::Pending);

        let flows = match self.calc_day(day).await {
            Ok(flows) => flows,
            Err(e @ FlowError::AggregationEmpty { .. }) => {
                warn!(%day, "No results: {}", e);
                return DayOutcome::Skipped {
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                error!(%day, "Flow calculation failed: {}", e);
                return DayOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if self.config.dry_run {
            info!(
                %day,
                rows = flows.len(),
                flows = %serde_json::to_string(&flows).unwrap_or_default(),
                "dry run, not persisting"
            );
            return DayOutcome::DryRun { rows: flows.len() };
        }

        match self.try_insert_flows(flows).await {
            Ok(rows) => DayOutcome::Persisted { rows },
            Err(e) => DayOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    /// Walk backward from `start` to `end` inclusive, one day at a time
    pub async fn run_flow_updates_for_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BackfillSummary {
        let mut summary = BackfillSummary::default();
        let mut current_day = start;

        while current_day >= end {
            if self.cancel.is_cancelled() {
                warn!(%current_day, "Emission update cancelled");
                summary.cancelled = true;
                break;
            }

            info!("Running emission update for {}", current_day);
            let outcome = self.run_and_store_emission_flows(current_day).await;
            info!(day = %current_day, stage = %outcome.stage(), "emission update finished");
            summary.record(current_day, outcome);

            current_day -= Duration::days(1);
        }

        info!(
            persisted = summary.days_persisted(),
            dry_run = summary.days_dry_run(),
            skipped = summary.days_skipped(),
            failed = summary.days_failed(),
            rows = summary.rows_written,
            "Emission update complete"
        );

        summary
    }

    /// Run emission flows for `days` days back from `day` (inclusive of both
    /// ends). Without an explicit day the anchor is the network's last
    /// complete day minus `offset_days`.
    pub async fn run_emission_update_day(
        &self,
        days: u32,
        day: Option<NaiveDate>,
        offset_days: u32,
    ) -> BackfillSummary {
        let day = day.unwrap_or_else(|| {
            self.network.last_complete_day(Utc::now()) - Duration::days(offset_days as i64)
        });
        let date_min = day - Duration::days(days as i64);

        self.run_flow_updates_for_date_range(day, date_min).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{MemoryStore, MockFlowStore};
    use crate::simulation::{MarketDayConfig, MarketDaySimulator};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn seeded_store(days: &[NaiveDate]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut sim = MarketDaySimulator::new(MarketDayConfig::default());
        for d in days {
            let data = sim.generate_day(Network::Nem, *d);
            store.insert_generation(data.generation);
            store.insert_interconnectors(data.interconnectors);
        }
        store
    }

    #[tokio::test]
    async fn test_day_is_persisted() {
        let store = seeded_store(&[day()]);
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, WorkerConfig::default());

        let outcome = worker.run_and_store_emission_flows(day()).await;

        assert_eq!(outcome, DayOutcome::Persisted { rows: 5 });
        assert_eq!(store.flow_rows().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_day_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, WorkerConfig::default());

        let outcome = worker.run_and_store_emission_flows(day()).await;

        assert!(matches!(outcome, DayOutcome::Skipped { .. }));
        assert!(store.flow_rows().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_fails_day() {
        let mut store = MockFlowStore::new();
        store
            .expect_load_generation_intervals()
            .returning(|_, _, _| Err(StoreError::Connection("connection reset".into())));
        store.expect_bulk_upsert().never();
        let worker = EmissionFlowWorker::new(Arc::new(store), Network::Nem, WorkerConfig::default());

        let outcome = worker.run_and_store_emission_flows(day()).await;

        assert_eq!(outcome.stage(), DayStage::Failed);
    }

    #[tokio::test]
    async fn test_persist_failure_reports_zero_rows() {
        let store = seeded_store(&[day()]);
        store.fail_upserts(true);
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, WorkerConfig::default());

        let flows = worker.calc_day(day()).await.unwrap();
        assert_eq!(worker.insert_flows(flows).await, 0);

        let outcome = worker.run_and_store_emission_flows(day()).await;
        assert_eq!(outcome.stage(), DayStage::Failed);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = seeded_store(&[day()]);
        let config = WorkerConfig {
            dry_run: true,
            ..Default::default()
        };
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, config);

        let outcome = worker.run_and_store_emission_flows(day()).await;

        assert_eq!(outcome, DayOutcome::DryRun { rows: 5 });
        assert!(store.flow_rows().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_range_counts_nothing_persisted() {
        let store = seeded_store(&[day()]);
        let config = WorkerConfig {
            dry_run: true,
            ..Default::default()
        };
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, config);

        let summary = worker.run_emission_update_day(0, Some(day()), 0).await;

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.days_persisted(), 0);
        assert_eq!(summary.days_dry_run(), 1);
        assert_eq!(summary.rows_written, 0);
        assert_eq!(summary.outcomes[0].1.stage(), DayStage::DryRun);
        assert!(store.flow_rows().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_network_fails() {
        let store = Arc::new(MemoryStore::new());
        let worker = EmissionFlowWorker::new(store, Network::Wem, WorkerConfig::default());

        let err = worker.calc_day(day()).await.unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedNetwork(Network::Wem)));
    }

    #[tokio::test]
    async fn test_range_walks_backward_inclusive() {
        let days = [day(), day() - Duration::days(1), day() - Duration::days(2)];
        let store = seeded_store(&days);
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, WorkerConfig::default());

        let summary = worker.run_emission_update_day(2, Some(day()), 1).await;

        let visited: Vec<_> = summary.outcomes.iter().map(|(d, _)| *d).collect();
        assert_eq!(visited, days.to_vec());
        assert_eq!(summary.days_persisted(), 3);
        assert_eq!(summary.rows_written, 15);
        assert_eq!(store.flow_rows().len(), 15);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let store = seeded_store(&[day()]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let worker = EmissionFlowWorker::new(store.clone(), Network::Nem, WorkerConfig::default())
            .with_cancellation(cancel);

        let summary = worker.run_emission_update_day(1, Some(day()), 1).await;

        assert!(summary.cancelled);
        assert!(summary.outcomes.is_empty());
        assert!(store.flow_rows().is_empty());
    }
}
