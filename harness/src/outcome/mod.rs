//! Outcome collection and reduction
//!
//! Workers append `OutcomeRecord`s to the shared `MetricsAggregator`; once a
//! scenario is closed the aggregator reduces them into `SummaryStats`.

mod aggregator;
mod record;
mod stats;

pub use aggregator::{MetricsAggregator, PhaseState};
pub use record::OutcomeRecord;
pub use stats::SummaryStats;
