//! Storage collaborator
//!
//! The flow pipeline only needs two interval reads and one set-based upsert.
//! `MemoryStore` backs tests and the simulated dev mode; `PgRepo` talks to
//! the production Postgres schema when built with the `db` feature.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::domain::{
    InterconnectorRecord, IntervalRecord, Network, NetworkFlowRow, TableDescriptor,
};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryStore;
#[cfg(feature = "db")]
pub use pg::PgRepo;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Query timed out after {0}s")]
    Timeout(u64),

    #[error("Bulk upsert into {table} failed: {reason}")]
    Persist { table: String, reason: String },

    #[error("Connection error: {0}")]
    Connection(String),
}

#[cfg(feature = "db")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Generation, energy and emissions for non-interconnector facilities
    /// in `[start, end)`
    async fn load_generation_intervals(
        &self,
        network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<IntervalRecord>, StoreError>;

    /// Interconnector flows in `[start, end)`
    async fn load_interconnector_intervals(
        &self,
        network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<InterconnectorRecord>, StoreError>;

    /// Insert-or-update keyed on `table.conflict_columns`. Only
    /// `table.update_columns` are overwritten on conflict. Returns rows written.
    async fn bulk_upsert(
        &self,
        table: &TableDescriptor,
        rows: &[NetworkFlowRow],
    ) -> Result<u64, StoreError>;
}
