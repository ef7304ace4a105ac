use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// NEM market region
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum NetworkRegion {
    #[strum(serialize = "NSW1")]
    #[serde(rename = "NSW1")]
    Nsw1,
    #[strum(serialize = "QLD1")]
    #[serde(rename = "QLD1")]
    Qld1,
    #[strum(serialize = "SA1")]
    #[serde(rename = "SA1")]
    Sa1,
    #[strum(serialize = "TAS1")]
    #[serde(rename = "TAS1")]
    Tas1,
    #[strum(serialize = "VIC1")]
    #[serde(rename = "VIC1")]
    Vic1,
}

/// One generation reading for a non-interconnector facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub trading_interval: DateTime<FixedOffset>,
    pub network_region: NetworkRegion,
    pub fueltech_id: Option<String>,
    /// Instantaneous generation (MW)
    pub power: f64,
    /// Interval energy (MWh)
    pub energy: f64,
    /// energy x emissions factor (tCO2-e)
    pub emissions: f64,
}

/// One interconnector reading, positive in the `region_from -> region_to` direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterconnectorRecord {
    pub trading_interval: DateTime<FixedOffset>,
    /// Signed flow (MW)
    pub generated: f64,
    pub region_from: NetworkRegion,
    pub region_to: NetworkRegion,
}

/// Day-level imports/exports for one region before audit metadata is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRegionFlows {
    pub trading_interval: DateTime<FixedOffset>,
    pub network_id: String,
    pub network_region: NetworkRegion,
    pub energy_imports: f64,
    pub energy_exports: f64,
    pub emissions_imports: f64,
    pub emissions_exports: f64,
}

/// Row of the `at_network_flows` aggregate table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFlowRow {
    pub trading_interval: DateTime<FixedOffset>,
    pub network_id: String,
    pub network_region: NetworkRegion,
    pub energy_imports: f64,
    pub energy_exports: f64,
    pub emissions_imports: f64,
    pub emissions_exports: f64,
    pub market_value_imports: f64,
    pub market_value_exports: f64,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl NetworkFlowRow {
    /// Attach audit metadata. Market value is not modelled and is always zero.
    pub fn from_daily(flows: DailyRegionFlows, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            trading_interval: flows.trading_interval,
            network_id: flows.network_id,
            network_region: flows.network_region,
            energy_imports: flows.energy_imports,
            energy_exports: flows.energy_exports,
            emissions_imports: flows.emissions_imports,
            emissions_exports: flows.emissions_exports,
            market_value_imports: 0.0,
            market_value_exports: 0.0,
            created_by: Some(created_by.to_string()),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Overwrite one persisted column with the value from `source`.
    /// Returns false for a column this row does not carry.
    pub fn copy_column(&mut self, column: &str, source: &NetworkFlowRow) -> bool {
        match column {
            "energy_imports" => self.energy_imports = source.energy_imports,
            "energy_exports" => self.energy_exports = source.energy_exports,
            "emissions_imports" => self.emissions_imports = source.emissions_imports,
            "emissions_exports" => self.emissions_exports = source.emissions_exports,
            "market_value_imports" => self.market_value_imports = source.market_value_imports,
            "market_value_exports" => self.market_value_exports = source.market_value_exports,
            "created_by" => self.created_by = source.created_by.clone(),
            "created_at" => self.created_at = source.created_at,
            "updated_at" => self.updated_at = source.updated_at,
            _ => return false,
        }
        true
    }

    /// Primary key of the aggregate table
    pub fn key(&self) -> (DateTime<FixedOffset>, String, NetworkRegion) {
        (self.trading_interval, self.network_id.clone(), self.network_region)
    }
}

/// Target table for the bulk upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: &'static str,
    /// Columns in persisted order
    pub columns: &'static [&'static str],
    pub conflict_columns: &'static [&'static str],
    pub update_columns: &'static [&'static str],
}

pub const AGGREGATE_NETWORK_FLOWS: TableDescriptor = TableDescriptor {
    name: "at_network_flows",
    columns: &[
        "trading_interval",
        "network_id",
        "network_region",
        "energy_imports",
        "energy_exports",
        "emissions_imports",
        "emissions_exports",
        "market_value_imports",
        "market_value_exports",
        "created_by",
        "created_at",
        "updated_at",
    ],
    conflict_columns: &["trading_interval", "network_id", "network_region"],
    update_columns: &[
        "energy_imports",
        "energy_exports",
        "emissions_imports",
        "emissions_exports",
        "market_value_imports",
        "market_value_exports",
        "created_by",
        "updated_at",
    ],
};
