pub mod emissions;
pub mod scheduler;

pub use emissions::{BackfillSummary, DayOutcome, DayStage, EmissionFlowWorker};
pub use scheduler::{PeriodicTaskConfig, TaskScheduler, TaskStatus};
