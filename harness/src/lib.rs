//! Catalog Stress Harness Library
//!
//! Drives concurrent insert/update/delete/mixed workloads against several
//! data catalogs that sit behind one SQL engine, and reports how each
//! catalog held up. Exported for the binary and for integration tests.

pub mod catalog;
pub mod config;
pub mod error;
pub mod outcome;
pub mod probe;
pub mod report;
pub mod runner;
pub mod workload;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use catalog::{
    CatalogTarget, ConnectionParams, ConnectionProvider, QueryResult, SqlConnection,
    TrinoProvider,
};
pub use config::Config;
pub use error::{ConnectionError, ExecutionError, HarnessError};
pub use outcome::{MetricsAggregator, OutcomeRecord, PhaseState, SummaryStats};
pub use probe::{ProbeReport, RunOutcome, RunPolicy, probe_targets, run_with_probe};
pub use report::{RunReport, ScenarioReport, TargetReport};
pub use runner::{Scheduler, SchedulerOptions};
pub use workload::{
    DelayRange, LoadTier, OperationGenerator, OperationKind, Scenario, ScenarioId, ScenarioKind,
};
