//! Scenario scheduler
//!
//! Runs scenarios strictly in sequence. Within a scenario every catalog
//! target gets `thread_count` workers, all dispatched together so the
//! backends see simultaneous load. A scenario only finishes once every
//! worker has returned, which keeps catalog states from bleeding into the
//! next scenario.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::worker::{WorkerContext, WorkerExit, WorkerUnit};
use crate::catalog::{CatalogTarget, ConnectionProvider};
use crate::error::HarnessError;
use crate::outcome::MetricsAggregator;
use crate::report::{FailureSample, RunReport, ScenarioReport, TargetReport};
use crate::workload::{OperationGenerator, Scenario, ScenarioId};

/// Failures kept per catalog for the report
pub const FAILURE_SAMPLE_SIZE: usize = 5;

/// Upper bound on scenarios in one plan; the key layout reserves three
/// decimal digits for the scenario ordinal
pub const MAX_SCENARIOS: usize = 999;

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Wall-clock limit per scenario before workers are told to stop
    pub scenario_timeout: Duration,
    /// Limit for a single worker to obtain a connection
    pub connect_timeout: Duration,
    /// Seed for inter-operation jitter
    pub seed: u64,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            scenario_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            seed: 0,
        }
    }
}

pub struct Scheduler {
    provider: Arc<dyn ConnectionProvider>,
    targets: Vec<Arc<CatalogTarget>>,
    generator: Arc<OperationGenerator>,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        targets: Vec<CatalogTarget>,
        generator: OperationGenerator,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            provider,
            targets: targets.into_iter().map(Arc::new).collect(),
            generator: Arc::new(generator),
            options,
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &CatalogTarget> {
        self.targets.iter().map(|t| t.as_ref())
    }

    /// Run a plan to completion.
    ///
    /// The whole plan is validated before anything is dispatched. Errors
    /// returned here are harness faults (contract violations or worker
    /// panics); statement failures and unreachable catalogs are part of
    /// the report.
    pub async fn run(&self, plan: &[Scenario]) -> Result<RunReport, HarnessError> {
        self.validate(plan)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let aggregator = Arc::new(MetricsAggregator::new());

        info!(
            "Run {}: {} scenario(s) against {} catalog(s) on table {}",
            run_id,
            plan.len(),
            self.targets.len(),
            self.generator.table()
        );

        let mut scenarios = Vec::with_capacity(plan.len());
        for (ordinal, scenario) in plan.iter().enumerate() {
            let id = ScenarioId {
                ordinal,
                kind: scenario.kind,
            };
            scenarios.push(self.run_scenario(&aggregator, id, scenario).await?);
        }

        Ok(RunReport {
            run_id,
            started_at,
            wall_secs: start.elapsed().as_secs_f64(),
            catalogs: self.targets.iter().map(|t| t.name.clone()).collect(),
            skipped_catalogs: Vec::new(),
            reduced_plan: false,
            scenarios,
        })
    }

    fn validate(&self, plan: &[Scenario]) -> Result<(), HarnessError> {
        if self.targets.is_empty() {
            return Err(HarnessError::contract("no catalog targets configured"));
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(HarnessError::contract(format!(
                    "duplicate catalog target {}",
                    target.name
                )));
            }
        }
        if plan.len() > MAX_SCENARIOS {
            return Err(HarnessError::contract(format!(
                "plan has {} scenarios, at most {MAX_SCENARIOS} supported",
                plan.len()
            )));
        }
        for scenario in plan {
            scenario.validate()?;
        }
        if self.options.scenario_timeout.is_zero() || self.options.connect_timeout.is_zero() {
            return Err(HarnessError::contract("timeouts must be positive"));
        }
        Ok(())
    }

    async fn run_scenario(
        &self,
        aggregator: &Arc<MetricsAggregator>,
        id: ScenarioId,
        scenario: &Scenario,
    ) -> Result<ScenarioReport, HarnessError> {
        let names: Vec<String> = self.targets.iter().map(|t| t.name.clone()).collect();
        aggregator
            .register(id, &names, scenario.thread_count)
            .await?;

        info!(
            "Scenario {}: {} workers x {} catalogs, {} ops/worker, batch {}, {} rows per catalog, delay {}",
            id,
            scenario.thread_count,
            self.targets.len(),
            scenario.operations_per_thread,
            scenario.batch_size,
            scenario.rows_per_catalog(),
            scenario.delay_range
        );

        let ctx = Arc::new(WorkerContext {
            scenario_id: id,
            scenario: scenario.clone(),
            generator: Arc::clone(&self.generator),
            sink: Arc::clone(aggregator),
            provider: Arc::clone(&self.provider),
            connect_timeout: self.options.connect_timeout,
        });
        let (stop_tx, stop_rx) = watch::channel(false);

        aggregator.start(id).await?;
        let start = Instant::now();

        let mut workers = JoinSet::new();
        for (target_index, target) in self.targets.iter().enumerate() {
            for worker_id in 0..scenario.thread_count {
                let unit = WorkerUnit::new(
                    Arc::clone(&ctx),
                    Arc::clone(target),
                    worker_id,
                    stop_rx.clone(),
                    self.jitter_seed(id, target_index, worker_id),
                );
                workers.spawn(unit.run());
            }
        }

        let deadline = tokio::time::sleep(self.options.scenario_timeout);
        tokio::pin!(deadline);
        let mut timed_out = false;
        let mut stopped = 0usize;

        let fatal = loop {
            tokio::select! {
                joined = workers.join_next() => {
                    match joined {
                        None => break None,
                        Some(Ok(Ok(report))) => {
                            debug!(
                                "Worker {}-w{} finished: {:?} after {} operations",
                                report.catalog, report.worker_id, report.exit, report.executed
                            );
                            if report.exit == WorkerExit::Stopped {
                                stopped += 1;
                            }
                        }
                        Some(Ok(Err(e))) => break Some(e),
                        Some(Err(join_error)) => {
                            break Some(HarnessError::contract(format!(
                                "worker task failed: {join_error}"
                            )));
                        }
                    }
                }
                _ = &mut deadline, if !timed_out => {
                    timed_out = true;
                    warn!(
                        "Scenario {} exceeded {:?}, stopping workers after their in-flight operation",
                        id, self.options.scenario_timeout
                    );
                    let _ = stop_tx.send(true);
                }
            }
        };

        if let Some(e) = fatal {
            error!("Scenario {} aborted: {}", id, e);
            let _ = stop_tx.send(true);
            workers.shutdown().await;
            return Err(e);
        }

        let wall_secs = start.elapsed().as_secs_f64();
        aggregator.drain(id).await?;
        aggregator.close(id).await?;

        let mut targets = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let stats = aggregator.finalize(id, &target.name).await?;
            let (sample, failure_count) = aggregator
                .failures(id, &target.name, FAILURE_SAMPLE_SIZE)
                .await?;

            if !stats.reachable() {
                warn!("Scenario {}: catalog {} was unreachable", id, target.name);
            } else {
                info!(
                    "Scenario {}: {} {}/{} succeeded in {:.2}s",
                    id, target.name, stats.succeeded, stats.total, wall_secs
                );
            }

            targets.push(TargetReport {
                stats,
                failure_count,
                failure_sample: sample.iter().map(FailureSample::from).collect(),
            });
        }

        if timed_out {
            warn!("Scenario {}: {} worker(s) stopped early", id, stopped);
        }

        Ok(ScenarioReport {
            id,
            scenario: scenario.clone(),
            wall_secs,
            timed_out,
            targets,
        })
    }

    fn jitter_seed(&self, id: ScenarioId, target_index: usize, worker_id: usize) -> u64 {
        self.options.seed
            ^ ((id.ordinal as u64) << 48)
            ^ ((target_index as u64) << 32)
            ^ worker_id as u64
    }
}
