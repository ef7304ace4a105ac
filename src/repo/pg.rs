#![cfg(feature = "db")]

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use super::{FlowStore, StoreError};
use crate::config::DbConfig;
use crate::domain::{
    InterconnectorRecord, IntervalRecord, Network, NetworkFlowRow, NetworkRegion, TableDescriptor,
};

/// Rows per INSERT statement; keeps bind parameters well under the Postgres limit
const UPSERT_CHUNK_ROWS: usize = 1000;

#[derive(Debug, FromRow)]
struct GenerationRow {
    trading_interval: DateTime<Utc>,
    network_region: Option<String>,
    fueltech_id: Option<String>,
    power: f64,
    energy: f64,
    emissions: f64,
}

#[derive(Debug, FromRow)]
struct InterconnectorRow {
    trading_interval: DateTime<Utc>,
    generated: f64,
    interconnector_region_from: Option<String>,
    interconnector_region_to: Option<String>,
}

fn parse_region(code: Option<&str>) -> Option<NetworkRegion> {
    code.and_then(|c| NetworkRegion::from_str(c).ok())
}

fn interconnector_record(row: InterconnectorRow, offset: FixedOffset) -> Option<InterconnectorRecord> {
    Some(InterconnectorRecord {
        trading_interval: row.trading_interval.with_timezone(&offset),
        generated: row.generated,
        region_from: parse_region(row.interconnector_region_from.as_deref())?,
        region_to: parse_region(row.interconnector_region_to.as_deref())?,
    })
}

/// Convert fetched rows, warning about any that carry no known region
fn keep_known_regions<R, T>(
    rows: Vec<R>,
    what: &str,
    convert: impl Fn(R) -> Option<T>,
) -> (Vec<T>, usize) {
    let total = rows.len();
    let records: Vec<T> = rows.into_iter().filter_map(convert).collect();
    let dropped = total - records.len();
    if dropped > 0 {
        warn!(dropped, "{} rows without a known network region", what);
    }
    (records, dropped)
}

pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    /// Connect with exponential backoff
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        info!("Initializing database connection pool");

        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            attempt += 1;
            match Self::try_connect(config).await {
                Ok(pool) => {
                    sqlx::query("SELECT 1")
                        .execute(&pool)
                        .await
                        .context("Database health check failed")?;
                    info!("Database connection pool initialized");
                    return Ok(Self { pool });
                }
                Err(e) if attempt >= config.connect_attempts => {
                    return Err(e).context(format!(
                        "Failed to connect to database after {} attempts",
                        config.connect_attempts
                    ));
                }
                Err(e) => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, config.connect_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn try_connect(config: &DbConfig) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to create database pool")?;
        Ok(pool)
    }
}

#[async_trait]
impl FlowStore for PgRepo {
    async fn load_generation_intervals(
        &self,
        network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<IntervalRecord>, StoreError> {
        let rows: Vec<GenerationRow> = sqlx::query_as(
            r#"
            SELECT
                fs.trading_interval AS trading_interval,
                f.network_region,
                f.fueltech_id,
                coalesce(fs.generated, 0)::float8 AS power,
                coalesce(fs.eoi_quantity, 0)::float8 AS energy,
                coalesce(fs.eoi_quantity * f.emissions_factor_co2, 0)::float8 AS emissions
            FROM facility_scada fs
            LEFT JOIN facility f ON fs.facility_code = f.code
            WHERE
                fs.trading_interval >= $1
                AND fs.trading_interval < $2
                AND f.network_id = $3
                AND f.interconnector IS FALSE
            ORDER BY 1 ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(network.code())
        .fetch_all(&self.pool)
        .await?;

        let offset = network.fixed_offset();
        let (records, _) = keep_known_regions(rows, "generation", |row: GenerationRow| {
            Some(IntervalRecord {
                trading_interval: row.trading_interval.with_timezone(&offset),
                network_region: parse_region(row.network_region.as_deref())?,
                fueltech_id: row.fueltech_id,
                power: row.power,
                energy: row.energy,
                emissions: row.emissions,
            })
        });
        debug!(rows = records.len(), %start, %end, "loaded generation intervals");

        Ok(records)
    }

    async fn load_interconnector_intervals(
        &self,
        network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<InterconnectorRecord>, StoreError> {
        let rows: Vec<InterconnectorRow> = sqlx::query_as(
            r#"
            SELECT
                fs.trading_interval AS trading_interval,
                coalesce(fs.generated, 0)::float8 AS generated,
                f.interconnector_region_from,
                f.interconnector_region_to
            FROM facility_scada fs
            LEFT JOIN facility f ON f.code = fs.facility_code
            WHERE
                f.interconnector IS TRUE
                AND f.network_id = $3
                AND fs.trading_interval >= $1
                AND fs.trading_interval < $2
            ORDER BY 1 ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(network.code())
        .fetch_all(&self.pool)
        .await?;

        let offset = network.fixed_offset();
        let (records, _) = keep_known_regions(rows, "interconnector", |row: InterconnectorRow| {
            interconnector_record(row, offset)
        });

        debug!(rows = records.len(), %start, %end, "loaded interconnector intervals");

        Ok(records)
    }

    async fn bulk_upsert(
        &self,
        table: &TableDescriptor,
        rows: &[NetworkFlowRow],
    ) -> Result<u64, StoreError> {
        let persist_err = |e: sqlx::Error| StoreError::Persist {
            table: table.name.to_string(),
            reason: e.to_string(),
        };

        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(persist_err)?;
        let mut written = 0;

        for chunk in rows.chunks(UPSERT_CHUNK_ROWS) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table.name,
                table.columns.join(", ")
            ));

            // bind order follows AGGREGATE_NETWORK_FLOWS.columns
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.trading_interval)
                    .push_bind(row.network_id.clone())
                    .push_bind(row.network_region.to_string())
                    .push_bind(row.energy_imports)
                    .push_bind(row.energy_exports)
                    .push_bind(row.emissions_imports)
                    .push_bind(row.emissions_exports)
                    .push_bind(row.market_value_imports)
                    .push_bind(row.market_value_exports)
                    .push_bind(row.created_by.clone())
                    .push_bind(row.created_at)
                    .push_bind(row.updated_at);
            });

            let updates = table
                .update_columns
                .iter()
                .map(|c| format!("{c} = EXCLUDED.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            qb.push(format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                table.conflict_columns.join(", "),
                updates
            ));

            let result = qb.build().execute(&mut *tx).await.map_err(persist_err)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(persist_err)?;

        info!(table = table.name, rows = written, "upserted flow rows");

        Ok(written)
    }
}
