//! Append-only outcome sink shared by all worker units
//!
//! Each scenario phase moves through
//! `Pending -> Running -> Draining -> Closed`. Records are only accepted
//! while the phase is `Running` or `Draining`; an append after `Closed`
//! means a worker outlived its scenario and fails the run.

use indexmap::IndexMap;
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::record::OutcomeRecord;
use super::stats::SummaryStats;
use crate::error::HarnessError;
use crate::workload::ScenarioId;

/// Lifecycle of one scenario phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Registered, no worker dispatched yet
    Pending,
    /// Workers dispatched
    Running,
    /// Every worker has returned, waiting for the last records
    Draining,
    /// Statistics computed, no further appends accepted
    Closed,
}

#[derive(Debug, Default)]
struct CatalogLog {
    records: Vec<OutcomeRecord>,
    unreachable_workers: usize,
}

#[derive(Debug)]
struct Phase {
    state: PhaseState,
    workers_per_catalog: usize,
    catalogs: IndexMap<String, CatalogLog>,
    stats: IndexMap<String, SummaryStats>,
}

impl Phase {
    fn accepting(&self, scenario: ScenarioId) -> Result<(), HarnessError> {
        match self.state {
            PhaseState::Running | PhaseState::Draining => Ok(()),
            PhaseState::Closed => Err(HarnessError::contract(format!(
                "append to scenario {scenario} after it was closed"
            ))),
            PhaseState::Pending => Err(HarnessError::contract(format!(
                "append to scenario {scenario} before it started"
            ))),
        }
    }

    fn log_mut(
        &mut self,
        scenario: ScenarioId,
        catalog: &str,
    ) -> Result<&mut CatalogLog, HarnessError> {
        self.catalogs.get_mut(catalog).ok_or_else(|| {
            HarnessError::contract(format!(
                "catalog {catalog} is not registered for scenario {scenario}"
            ))
        })
    }
}

/// Serialized sink for outcome records and per-scenario statistics
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    phases: Mutex<IndexMap<ScenarioId, Phase>>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scenario phase for a set of catalogs
    pub async fn register(
        &self,
        scenario: ScenarioId,
        catalogs: &[String],
        workers_per_catalog: usize,
    ) -> Result<(), HarnessError> {
        let mut phases = self.phases.lock().await;
        if phases.contains_key(&scenario) {
            return Err(HarnessError::contract(format!(
                "scenario {scenario} registered twice"
            )));
        }
        let catalogs = catalogs
            .iter()
            .map(|name| (name.clone(), CatalogLog::default()))
            .collect();
        phases.insert(
            scenario,
            Phase {
                state: PhaseState::Pending,
                workers_per_catalog,
                catalogs,
                stats: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// `Pending -> Running`
    pub async fn start(&self, scenario: ScenarioId) -> Result<(), HarnessError> {
        self.transition(scenario, PhaseState::Pending, PhaseState::Running)
            .await
    }

    /// `Running -> Draining`
    pub async fn drain(&self, scenario: ScenarioId) -> Result<(), HarnessError> {
        self.transition(scenario, PhaseState::Running, PhaseState::Draining)
            .await
    }

    /// Append one record. This is the only write path shared by workers.
    pub async fn append(&self, record: OutcomeRecord) -> Result<(), HarnessError> {
        let scenario = record.scenario;
        let mut phases = self.phases.lock().await;
        let phase = phase_mut(&mut phases, scenario)?;
        if let Err(e) = phase.accepting(scenario) {
            error!(
                "Rejected outcome from worker {} on {}: {}",
                record.worker_id, record.catalog_name, e
            );
            return Err(e);
        }
        let log = phase.log_mut(scenario, &record.catalog_name)?;

        let outcome = if record.success { "success" } else { "failure" };
        counter!(
            "catalog_stress_operations_total",
            "catalog" => record.catalog_name.clone(),
            "scenario" => scenario.kind.name(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!(
            "catalog_stress_operation_duration_seconds",
            "catalog" => record.catalog_name.clone(),
            "scenario" => scenario.kind.name()
        )
        .record(record.duration_seconds);

        log.records.push(record);
        Ok(())
    }

    /// Note a worker that could not obtain a connection
    pub async fn record_unreachable(
        &self,
        scenario: ScenarioId,
        catalog: &str,
    ) -> Result<(), HarnessError> {
        let mut phases = self.phases.lock().await;
        let phase = phase_mut(&mut phases, scenario)?;
        phase.accepting(scenario)?;
        phase.log_mut(scenario, catalog)?.unreachable_workers += 1;
        counter!("catalog_stress_unreachable_workers_total", "catalog" => catalog.to_string())
            .increment(1);
        Ok(())
    }

    /// `Draining -> Closed`, computing statistics for every catalog.
    /// Closing an already closed phase is a no-op.
    pub async fn close(&self, scenario: ScenarioId) -> Result<(), HarnessError> {
        let mut phases = self.phases.lock().await;
        let phase = phase_mut(&mut phases, scenario)?;
        match phase.state {
            PhaseState::Closed => return Ok(()),
            PhaseState::Draining => {}
            other => {
                return Err(HarnessError::contract(format!(
                    "cannot close scenario {scenario} from state {other:?}"
                )));
            }
        }

        let workers = phase.workers_per_catalog;
        phase.stats = phase
            .catalogs
            .iter()
            .map(|(name, log)| {
                let stats = SummaryStats::compute(
                    name,
                    scenario,
                    &log.records,
                    workers,
                    log.unreachable_workers,
                );
                (name.clone(), stats)
            })
            .collect();
        phase.state = PhaseState::Closed;
        debug!("Scenario {} closed", scenario);
        Ok(())
    }

    /// Statistics for one catalog in a scenario. Closes a draining phase;
    /// repeated calls on a closed phase return identical values.
    pub async fn finalize(
        &self,
        scenario: ScenarioId,
        catalog: &str,
    ) -> Result<SummaryStats, HarnessError> {
        if self.state(scenario).await == Some(PhaseState::Draining) {
            self.close(scenario).await?;
        }

        let phases = self.phases.lock().await;
        let phase = phases.get(&scenario).ok_or_else(|| unknown(scenario))?;
        if phase.state != PhaseState::Closed {
            return Err(HarnessError::contract(format!(
                "cannot finalize scenario {scenario} in state {:?}",
                phase.state
            )));
        }
        phase.stats.get(catalog).cloned().ok_or_else(|| {
            HarnessError::contract(format!(
                "catalog {catalog} is not registered for scenario {scenario}"
            ))
        })
    }

    pub async fn state(&self, scenario: ScenarioId) -> Option<PhaseState> {
        self.phases.lock().await.get(&scenario).map(|p| p.state)
    }

    /// Records for a catalog in arrival order
    pub async fn records(
        &self,
        scenario: ScenarioId,
        catalog: &str,
    ) -> Result<Vec<OutcomeRecord>, HarnessError> {
        let phases = self.phases.lock().await;
        let phase = phases.get(&scenario).ok_or_else(|| unknown(scenario))?;
        Ok(phase
            .catalogs
            .get(catalog)
            .map(|log| log.records.clone())
            .unwrap_or_default())
    }

    /// First `limit` failed records for a catalog, in arrival order, plus
    /// the total number of failures
    pub async fn failures(
        &self,
        scenario: ScenarioId,
        catalog: &str,
        limit: usize,
    ) -> Result<(Vec<OutcomeRecord>, usize), HarnessError> {
        let records = self.records(scenario, catalog).await?;
        let failed: Vec<OutcomeRecord> = records.into_iter().filter(|r| !r.success).collect();
        let total = failed.len();
        Ok((failed.into_iter().take(limit).collect(), total))
    }

    async fn transition(
        &self,
        scenario: ScenarioId,
        from: PhaseState,
        to: PhaseState,
    ) -> Result<(), HarnessError> {
        let mut phases = self.phases.lock().await;
        let phase = phase_mut(&mut phases, scenario)?;
        if phase.state != from {
            return Err(HarnessError::contract(format!(
                "scenario {scenario}: expected state {from:?} before {to:?}, found {:?}",
                phase.state
            )));
        }
        phase.state = to;
        Ok(())
    }
}

fn phase_mut(
    phases: &mut IndexMap<ScenarioId, Phase>,
    scenario: ScenarioId,
) -> Result<&mut Phase, HarnessError> {
    phases.get_mut(&scenario).ok_or_else(|| unknown(scenario))
}

fn unknown(scenario: ScenarioId) -> HarnessError {
    HarnessError::contract(format!("scenario {scenario} was never registered"))
}
