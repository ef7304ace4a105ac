use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;

use super::{FlowStore, StoreError};
use crate::domain::{
    InterconnectorRecord, IntervalRecord, Network, NetworkFlowRow, NetworkRegion, TableDescriptor,
};

type FlowKey = (DateTime<FixedOffset>, String, NetworkRegion);

/// In-process store with the same upsert semantics as the Postgres table
#[derive(Default)]
pub struct MemoryStore {
    generation: Mutex<Vec<IntervalRecord>>,
    interconnectors: Mutex<Vec<InterconnectorRecord>>,
    flows: Mutex<BTreeMap<FlowKey, NetworkFlowRow>>,
    fail_loads: AtomicBool,
    fail_upserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_generation(&self, records: impl IntoIterator<Item = IntervalRecord>) {
        self.generation.lock().extend(records);
    }

    pub fn insert_interconnectors(&self, records: impl IntoIterator<Item = InterconnectorRecord>) {
        self.interconnectors.lock().extend(records);
    }

    /// Make every subsequent read fail
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent upsert fail
    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the aggregate table in key order
    pub fn flow_rows(&self) -> Vec<NetworkFlowRow> {
        self.flows.lock().values().cloned().collect()
    }

    fn check_loads(&self) -> Result<(), StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Query("injected load failure".into()));
        }
        Ok(())
    }
}

fn in_window(
    ts: DateTime<FixedOffset>,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> bool {
    ts >= start && ts < end
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn load_generation_intervals(
        &self,
        _network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<IntervalRecord>, StoreError> {
        self.check_loads()?;
        let mut rows: Vec<_> = self
            .generation
            .lock()
            .iter()
            .filter(|r| in_window(r.trading_interval, start, end))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.trading_interval);
        Ok(rows)
    }

    async fn load_interconnector_intervals(
        &self,
        _network: Network,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<InterconnectorRecord>, StoreError> {
        self.check_loads()?;
        let mut rows: Vec<_> = self
            .interconnectors
            .lock()
            .iter()
            .filter(|r| in_window(r.trading_interval, start, end))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.trading_interval);
        Ok(rows)
    }

    async fn bulk_upsert(
        &self,
        table: &TableDescriptor,
        rows: &[NetworkFlowRow],
    ) -> Result<u64, StoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::Persist {
                table: table.name.to_string(),
                reason: "injected upsert failure".into(),
            });
        }

        let mut flows = self.flows.lock();
        for row in rows {
            match flows.get_mut(&row.key()) {
                Some(existing) => {
                    for column in table.update_columns {
                        if !existing.copy_column(column, row) {
                            return Err(StoreError::Persist {
                                table: table.name.to_string(),
                                reason: format!("unknown update column {column}"),
                            });
                        }
                    }
                }
                None => {
                    flows.insert(row.key(), row.clone());
                }
            }
        }
        Ok(rows.len() as u64)
    }
}
