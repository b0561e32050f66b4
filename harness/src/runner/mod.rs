//! Worker cohorts and scenario sequencing

mod scheduler;
mod worker;

pub use scheduler::{FAILURE_SAMPLE_SIZE, MAX_SCENARIOS, Scheduler, SchedulerOptions};
pub use worker::{WorkerContext, WorkerExit, WorkerReport, WorkerUnit};
