use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::emissions::{BackfillSummary, DayOutcome, EmissionFlowWorker};

/// Periodic task configuration
#[derive(Debug, Clone)]
pub struct PeriodicTaskConfig {
    /// Interval between emission flow runs (seconds)
    pub run_interval_secs: u64,
    /// Days to walk back on each run
    pub days: u32,
    pub offset_days: u32,
}

impl Default for PeriodicTaskConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: 3600, // 1 hour
            days: 1,
            offset_days: 1,
        }
    }
}

/// Task status tracking
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

impl TaskStatus {
    fn record(&mut self, summary: &BackfillSummary) {
        let now = Utc::now();
        self.last_run = Some(now);
        self.run_count += 1;

        if summary.cancelled {
            self.error_count += 1;
            self.last_error = Some(format!(
                "cancelled after {} of the requested days",
                summary.outcomes.len()
            ));
        } else if summary.days_failed() == 0 {
            self.last_success = Some(now);
            self.success_count += 1;
        } else {
            self.error_count += 1;
            self.last_error = summary
                .outcomes
                .iter()
                .rev()
                .find_map(|(day, outcome)| match outcome {
                    DayOutcome::Failed { error } => Some(format!("{day}: {error}")),
                    _ => None,
                });
        }
    }
}

/// Periodic runner for the emission flow worker
pub struct TaskScheduler {
    config: PeriodicTaskConfig,
    worker: Arc<EmissionFlowWorker>,
    status: Arc<RwLock<TaskStatus>>,
    cancel: CancellationToken,
}

impl TaskScheduler {
    pub fn with_config(
        worker: Arc<EmissionFlowWorker>,
        cancel: CancellationToken,
        config: PeriodicTaskConfig,
    ) -> Self {
        Self {
            config,
            worker,
            status: Arc::new(RwLock::new(TaskStatus::default())),
            cancel,
        }
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    /// Run one emission update and record its status
    pub async fn run_once(&self) -> BackfillSummary {
        let summary = self
            .worker
            .run_emission_update_day(self.config.days, None, self.config.offset_days)
            .await;

        let mut status = self.status.write().await;
        status.record(&summary);
        if summary.days_failed() > 0 {
            warn!(
                failed = summary.days_failed(),
                error_count = status.error_count,
                "Emission flow run had failures"
            );
        }

        summary
    }

    /// Tick until cancelled. The first run starts immediately.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.run_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            every_secs = self.config.run_interval_secs,
            "Starting emission flow scheduler"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Emission flow scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.run_once().await;
                    if summary.cancelled {
                        error!("Emission flow run interrupted by shutdown");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::domain::Network;
    use crate::repo::MemoryStore;

    fn scheduler(store: Arc<MemoryStore>, cancel: CancellationToken) -> Arc<TaskScheduler> {
        let worker = EmissionFlowWorker::new(store, Network::Nem, WorkerConfig::default())
            .with_cancellation(cancel.clone());
        Arc::new(TaskScheduler::with_config(
            Arc::new(worker),
            cancel,
            PeriodicTaskConfig {
                run_interval_secs: 60,
                days: 0,
                offset_days: 1,
            },
        ))
    }

    #[tokio::test]
    async fn test_run_once_updates_status() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = scheduler(store, CancellationToken::new());

        let summary = scheduler.run_once().await;
        let status = scheduler.status().await;

        // no data: the day is skipped, which is not an error
        assert_eq!(summary.days_skipped(), 1);
        assert_eq!(status.run_count, 1);
        assert_eq!(status.success_count, 1);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let store = Arc::new(MemoryStore::new());
        store.fail_loads(true);
        let scheduler = scheduler(store, CancellationToken::new());

        scheduler.run_once().await;
        let status = scheduler.status().await;

        assert_eq!(status.error_count, 1);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_cancelled_run_is_not_a_success() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scheduler = scheduler(store, cancel);

        let summary = scheduler.run_once().await;
        let status = scheduler.status().await;

        assert!(summary.cancelled);
        assert_eq!(status.run_count, 1);
        assert_eq!(status.success_count, 0);
        assert!(status.last_success.is_none());
        assert_eq!(status.error_count, 1);
        assert!(status.last_error.unwrap().starts_with("cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let scheduler = scheduler(store, cancel.clone());

        let handle = tokio::spawn(scheduler.clone().run());
        tokio::time::sleep(Duration::from_secs(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(scheduler.status().await.run_count >= 1);
    }
}
