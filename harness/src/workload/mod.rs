//! Workload definition: scenarios, load tiers and statement generation

mod generator;
mod scenario;

pub use generator::{
    Operation, OperationGenerator, OperationKind, SCENARIO_KEY_SPAN, WORKER_KEY_SPAN, row_key,
};
pub use scenario::{
    DelayRange, LoadTier, MAX_DELAY_SECS, MAX_ROWS_PER_WORKER, MAX_THREADS, Scenario, ScenarioId,
    ScenarioKind,
};
