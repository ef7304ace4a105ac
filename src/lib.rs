pub mod config;
pub mod domain;
pub mod flows;
pub mod repo;
#[cfg(any(test, feature = "sim"))]
pub mod simulation;
pub mod telemetry;
pub mod worker;
