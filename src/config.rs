use std::time::Duration;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::domain::Network;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub db: DbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub code: Network,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { code: Network::Nem }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Days to walk back from the anchor day
    pub days: u32,
    /// Days subtracted from the last complete day to get the anchor
    pub offset_days: u32,
    pub query_timeout_seconds: u64,
    pub created_by: String,
    /// Compute and log, but do not persist
    pub dry_run: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            days: 1,
            offset_days: 1,
            query_timeout_seconds: 120,
            created_by: "worker.emission_flows".to_string(),
            dry_run: false,
        }
    }
}

impl WorkerConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub every_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            every_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub connect_attempts: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/opennem".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            connect_attempts: 5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment("config/default.toml")
    }

    /// Defaults, then the TOML file, then `NEMFLOWS__` env vars
    pub fn figment(path: &str) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("NEMFLOWS__").split("__"));
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.network.code, Network::Nem);
        assert_eq!(cfg.worker.days, 1);
        assert_eq!(cfg.worker.offset_days, 1);
        assert_eq!(cfg.worker.query_timeout(), Duration::from_secs(120));
        assert!(!cfg.worker.dry_run);
        assert!(!cfg.schedule.enabled);
    }

    #[test]
    fn test_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "flows.toml",
                r#"
                [worker]
                days = 7
                offset_days = 2
                query_timeout_seconds = 30
                created_by = "backfill"
                dry_run = false
                "#,
            )?;
            jail.set_env("NEMFLOWS__WORKER__DRY_RUN", "true");
            jail.set_env("NEMFLOWS__NETWORK__CODE", "WEM");

            let cfg = Config::figment("flows.toml").map_err(|e| e.to_string())?;
            assert_eq!(cfg.worker.days, 7);
            assert_eq!(cfg.worker.created_by, "backfill");
            assert!(cfg.worker.dry_run);
            assert_eq!(cfg.network.code, Network::Wem);
            assert_eq!(cfg.db.max_connections, 10);
            Ok(())
        });
    }
}
