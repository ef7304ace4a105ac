use std::sync::Arc;

use anyhow::Result;
use nem_emission_flows::config::Config;
use nem_emission_flows::repo::FlowStore;
use nem_emission_flows::telemetry::{init_tracing, shutdown_signal};
use nem_emission_flows::worker::{EmissionFlowWorker, PeriodicTaskConfig, TaskScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(feature = "db")]
async fn build_store(cfg: &Config) -> Result<Arc<dyn FlowStore>> {
    let repo = nem_emission_flows::repo::PgRepo::connect(&cfg.db).await?;
    Ok(Arc::new(repo))
}

#[cfg(not(feature = "db"))]
async fn build_store(cfg: &Config) -> Result<Arc<dyn FlowStore>> {
    let store = nem_emission_flows::repo::MemoryStore::new();

    #[cfg(feature = "sim")]
    {
        use chrono::{Duration, Utc};
        use nem_emission_flows::simulation::{MarketDayConfig, MarketDaySimulator};

        let network = cfg.network.code;
        let anchor = network.last_complete_day(Utc::now())
            - Duration::days(cfg.worker.offset_days as i64);
        let mut sim = MarketDaySimulator::new(MarketDayConfig::default());
        for back in 0..=cfg.worker.days as i64 {
            let data = sim.generate_day(network, anchor - Duration::days(back));
            store.insert_generation(data.generation);
            store.insert_interconnectors(data.interconnectors);
        }
        info!(%anchor, days = cfg.worker.days, "seeded simulated market data");
    }
    #[cfg(not(feature = "sim"))]
    warn!("built without `db` or `sim`: running against an empty store");

    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    info!(network = %cfg.network.code, "starting emission flow worker");

    let store = build_store(&cfg).await?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        });
    }

    let worker = Arc::new(
        EmissionFlowWorker::new(store, cfg.network.code, cfg.worker.clone())
            .with_cancellation(cancel.clone()),
    );

    if cfg.schedule.enabled {
        let scheduler = Arc::new(TaskScheduler::with_config(
            worker,
            cancel,
            PeriodicTaskConfig {
                run_interval_secs: cfg.schedule.every_minutes * 60,
                days: cfg.worker.days,
                offset_days: cfg.worker.offset_days,
            },
        ));
        scheduler.run().await;
    } else {
        let summary = worker
            .run_emission_update_day(cfg.worker.days, None, cfg.worker.offset_days)
            .await;
        info!(
            persisted = summary.days_persisted(),
            dry_run = summary.days_dry_run(),
            skipped = summary.days_skipped(),
            failed = summary.days_failed(),
            rows = summary.rows_written,
            "emission flow run finished"
        );
        if summary.cancelled {
            warn!("run cancelled before all days completed");
        }
    }

    warn!("shutdown complete");
    Ok(())
}
