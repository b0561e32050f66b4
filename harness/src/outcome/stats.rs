//! Summary statistics for one (catalog, scenario) pair

use serde::{Deserialize, Serialize};

use super::record::OutcomeRecord;
use crate::workload::{ScenarioId, ScenarioKind};

/// Reduced view of every outcome recorded for a catalog in one scenario.
///
/// Duration statistics cover successful operations only and are `None`
/// when nothing succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    #[serde(rename = "catalog")]
    pub catalog_name: String,
    #[serde(rename = "scenario")]
    pub scenario_kind: ScenarioKind,
    pub scenario_ordinal: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows_affected: u64,
    pub avg_s: Option<f64>,
    pub median_s: Option<f64>,
    pub min_s: Option<f64>,
    pub max_s: Option<f64>,
    pub stddev_s: Option<f64>,
    /// Workers dispatched for this catalog
    pub workers: usize,
    /// Workers that never obtained a connection
    pub unreachable_workers: usize,
}

impl SummaryStats {
    /// Reduce a set of records. The result does not depend on the order of
    /// `records`: durations are sorted before any arithmetic.
    pub fn compute(
        catalog_name: &str,
        scenario: ScenarioId,
        records: &[OutcomeRecord],
        workers: usize,
        unreachable_workers: usize,
    ) -> Self {
        let mut durations: Vec<f64> = records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.duration_seconds)
            .collect();
        durations.sort_by(f64::total_cmp);

        let succeeded = durations.len();
        let rows_affected = records
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.rows_affected)
            .sum();

        let avg = mean(&durations);
        Self {
            catalog_name: catalog_name.to_string(),
            scenario_kind: scenario.kind,
            scenario_ordinal: scenario.ordinal,
            total: records.len(),
            succeeded,
            failed: records.len() - succeeded,
            rows_affected,
            avg_s: avg,
            median_s: median(&durations),
            min_s: durations.first().copied(),
            max_s: durations.last().copied(),
            stddev_s: avg.map(|m| sample_stddev(&durations, m)),
            workers,
            unreachable_workers,
        }
    }

    /// At least one worker connected
    pub fn reachable(&self) -> bool {
        self.unreachable_workers < self.workers
    }

    /// Fraction of attempts that succeeded, 0 when nothing was attempted
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }

    /// Rows affected per second of wall time
    pub fn throughput(&self, wall_secs: f64) -> f64 {
        if wall_secs > 0.0 {
            self.rows_affected as f64 / wall_secs
        } else {
            0.0
        }
    }
}

fn mean(sorted: &[f64]) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted.iter().sum::<f64>() / sorted.len() as f64)
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn sample_stddev(sorted: &[f64], mean: f64) -> f64 {
    if sorted.len() < 2 {
        return 0.0;
    }
    let variance =
        sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (sorted.len() - 1) as f64;
    variance.sqrt()
}
