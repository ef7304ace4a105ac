//! # Market Simulation Module
//!
//! Deterministic synthetic SCADA for running the flow pipeline without a
//! database: the binary seeds a `MemoryStore` from it when built without the
//! `db` feature, and the tests use it as their fixture day.
//!
//! ```rust
//! use nem_emission_flows::domain::Network;
//! use nem_emission_flows::simulation::{MarketDayConfig, MarketDaySimulator};
//!
//! let mut sim = MarketDaySimulator::new(MarketDayConfig::default());
//! let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let data = sim.generate_day(Network::Nem, day);
//! assert!(!data.generation.is_empty());
//! ```

pub mod market;

pub use market::{MarketDay, MarketDayConfig, MarketDaySimulator};
