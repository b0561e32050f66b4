//! Worker unit: one simulated client executing a fixed operation quota

use chrono::Utc;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogTarget, ConnectionProvider, SqlConnection};
use crate::error::{ConnectionError, HarnessError};
use crate::outcome::{MetricsAggregator, OutcomeRecord};
use crate::workload::{OperationGenerator, Scenario, ScenarioId};

/// State shared by every worker of one scenario phase
pub struct WorkerContext {
    pub scenario_id: ScenarioId,
    pub scenario: Scenario,
    pub generator: Arc<OperationGenerator>,
    pub sink: Arc<MetricsAggregator>,
    pub provider: Arc<dyn ConnectionProvider>,
    pub connect_timeout: Duration,
}

/// How a worker left its scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Whole quota executed
    Completed,
    /// Stop signal observed before the quota was exhausted
    Stopped,
    /// No connection could be obtained
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub catalog: String,
    pub worker_id: usize,
    /// Operations executed (and recorded)
    pub executed: usize,
    pub exit: WorkerExit,
}

pub struct WorkerUnit {
    ctx: Arc<WorkerContext>,
    target: Arc<CatalogTarget>,
    worker_id: usize,
    label: String,
    stop: watch::Receiver<bool>,
    jitter: ChaCha8Rng,
}

impl WorkerUnit {
    pub fn new(
        ctx: Arc<WorkerContext>,
        target: Arc<CatalogTarget>,
        worker_id: usize,
        stop: watch::Receiver<bool>,
        jitter_seed: u64,
    ) -> Self {
        let label = format!("{}-w{}", target.name, worker_id);
        Self {
            ctx,
            target,
            worker_id,
            label,
            stop,
            jitter: ChaCha8Rng::seed_from_u64(jitter_seed),
        }
    }

    /// Execute the quota. Statement failures become records; only a
    /// rejected append (a harness bug) is returned as an error.
    pub async fn run(mut self) -> Result<WorkerReport, HarnessError> {
        let quota = self.ctx.scenario.operations_per_thread;
        info!(
            "[{}] Starting {} scenario: {} operations, batch size {}",
            self.label, self.ctx.scenario.kind, quota, self.ctx.scenario.batch_size
        );

        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("[{}] Catalog unreachable: {}", self.label, e);
                self.ctx
                    .sink
                    .record_unreachable(self.ctx.scenario_id, &self.target.name)
                    .await?;
                return Ok(self.report(0, WorkerExit::Unreachable));
            }
        };

        for operation_index in 0..quota {
            if !self.pause().await {
                info!(
                    "[{}] Stop signal received after {}/{} operations",
                    self.label, operation_index, quota
                );
                return Ok(self.report(operation_index, WorkerExit::Stopped));
            }

            let record = self.execute(conn.as_mut(), operation_index, quota).await;
            self.ctx.sink.append(record).await?;
        }

        info!("[{}] Completed all {} operations", self.label, quota);
        Ok(self.report(quota, WorkerExit::Completed))
    }

    async fn connect(&self) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        let timeout = self.ctx.connect_timeout;
        match tokio::time::timeout(timeout, self.ctx.provider.connect(&self.target)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout {
                target: self.target.name.clone(),
                after: timeout,
            }),
        }
    }

    /// Jitter sleep before an operation. Returns false when the worker
    /// should stop instead of dispatching another statement.
    async fn pause(&mut self) -> bool {
        if *self.stop.borrow() {
            return false;
        }
        let delay = self.ctx.scenario.delay_range.at(self.jitter.random::<f64>());
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.stop.wait_for(|stop| *stop) => false,
        }
    }

    async fn execute(
        &self,
        conn: &mut dyn SqlConnection,
        operation_index: usize,
        quota: usize,
    ) -> OutcomeRecord {
        let ctx = &self.ctx;
        let operation = ctx.generator.generate(
            ctx.scenario_id,
            ctx.scenario.batch_size,
            self.worker_id,
            &self.label,
            operation_index,
        );
        debug!(
            "[{}] Executing {} {}/{}",
            self.label,
            operation.kind,
            operation_index + 1,
            quota
        );

        let timestamp = Utc::now();
        let start = Instant::now();
        let result = conn.execute(&operation.statement).await;
        let duration_seconds = start.elapsed().as_secs_f64();

        let (success, rows_affected, error_message) = match result {
            Ok(result) => {
                let rows = result.rows_affected();
                info!(
                    "[{}] {} {}/{} completed in {:.2}s, {} rows",
                    self.label,
                    operation.kind,
                    operation_index + 1,
                    quota,
                    duration_seconds,
                    rows
                );
                (true, Some(rows), None)
            }
            Err(e) => {
                warn!(
                    "[{}] {} {}/{} failed after {:.2}s: {}",
                    self.label,
                    operation.kind,
                    operation_index + 1,
                    quota,
                    duration_seconds,
                    e
                );
                (false, None, Some(e.to_string()))
            }
        };

        OutcomeRecord {
            catalog_name: self.target.name.clone(),
            scenario: ctx.scenario_id,
            worker_id: self.worker_id,
            operation_index,
            operation_kind: operation.kind,
            success,
            duration_seconds,
            rows_affected,
            error_message,
            timestamp,
        }
    }

    fn report(&self, executed: usize, exit: WorkerExit) -> WorkerReport {
        WorkerReport {
            catalog: self.target.name.clone(),
            worker_id: self.worker_id,
            executed,
            exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedProvider, insert_scenario, test_generator, test_target};
    use crate::workload::{DelayRange, ScenarioKind};

    async fn context(
        provider: ScriptedProvider,
        scenario: Scenario,
    ) -> (Arc<WorkerContext>, ScenarioId) {
        let scenario_id = ScenarioId {
            ordinal: 0,
            kind: scenario.kind,
        };
        let sink = Arc::new(MetricsAggregator::new());
        sink.register(
            scenario_id,
            &["iceberg_polaris".to_string()],
            scenario.thread_count,
        )
        .await
        .unwrap();
        sink.start(scenario_id).await.unwrap();
        let ctx = Arc::new(WorkerContext {
            scenario_id,
            scenario,
            generator: Arc::new(test_generator()),
            sink,
            provider: Arc::new(provider),
            connect_timeout: Duration::from_secs(1),
        });
        (ctx, scenario_id)
    }

    #[tokio::test]
    async fn test_worker_executes_quota_in_order() {
        let provider = ScriptedProvider::new();
        let (ctx, id) = context(provider.clone(), insert_scenario(1, 4, 2)).await;
        let (_tx, rx) = watch::channel(false);

        let unit = WorkerUnit::new(Arc::clone(&ctx), test_target("iceberg_polaris"), 0, rx, 1);
        let report = unit.run().await.unwrap();

        assert_eq!(report.exit, WorkerExit::Completed);
        assert_eq!(report.executed, 4);
        let records = ctx.sink.records(id, "iceberg_polaris").await.unwrap();
        let indices: Vec<usize> = records.iter().map(|r| r.operation_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(records.iter().all(|r| r.success && r.duration_seconds >= 0.0));
        assert_eq!(provider.statements("iceberg_polaris").len(), 4);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_quota() {
        let provider = ScriptedProvider::new().fail_every("iceberg_polaris", 2);
        let (ctx, id) = context(provider, insert_scenario(1, 5, 1)).await;
        let (_tx, rx) = watch::channel(false);

        let report = WorkerUnit::new(Arc::clone(&ctx), test_target("iceberg_polaris"), 0, rx, 1)
            .run()
            .await
            .unwrap();

        assert_eq!(report.executed, 5);
        let records = ctx.sink.records(id, "iceberg_polaris").await.unwrap();
        assert_eq!(records.len(), 5);
        let failed: Vec<&OutcomeRecord> = records.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|r| r.error_message.is_some()));
    }

    #[tokio::test]
    async fn test_unreachable_target_records_nothing() {
        let provider = ScriptedProvider::new().unreachable("iceberg_polaris");
        let (ctx, id) = context(provider, insert_scenario(1, 3, 1)).await;
        let (_tx, rx) = watch::channel(false);

        let report = WorkerUnit::new(Arc::clone(&ctx), test_target("iceberg_polaris"), 0, rx, 1)
            .run()
            .await
            .unwrap();

        assert_eq!(report.exit, WorkerExit::Unreachable);
        assert!(ctx.sink.records(id, "iceberg_polaris").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_timeout_counts_as_unreachable() {
        let provider = ScriptedProvider::new().hang_on_connect("iceberg_polaris");
        let (ctx, _) = context(provider, insert_scenario(1, 3, 1)).await;
        let ctx = Arc::new(WorkerContext {
            scenario_id: ctx.scenario_id,
            scenario: ctx.scenario.clone(),
            generator: Arc::clone(&ctx.generator),
            sink: Arc::clone(&ctx.sink),
            provider: Arc::clone(&ctx.provider),
            connect_timeout: Duration::from_millis(20),
        });
        let (_tx, rx) = watch::channel(false);

        let report = WorkerUnit::new(ctx, test_target("iceberg_polaris"), 0, rx, 1)
            .run()
            .await
            .unwrap();
        assert_eq!(report.exit, WorkerExit::Unreachable);
    }

    #[tokio::test]
    async fn test_stop_signal_interrupts_jitter_only() {
        let provider = ScriptedProvider::new();
        let scenario = Scenario {
            kind: ScenarioKind::Insert,
            thread_count: 1,
            operations_per_thread: 100,
            batch_size: 1,
            delay_range: DelayRange::new(0.05, 0.05).unwrap(),
        };
        let (ctx, id) = context(provider, scenario).await;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(
            WorkerUnit::new(Arc::clone(&ctx), test_target("iceberg_polaris"), 0, rx, 1).run(),
        );
        tokio::time::sleep(Duration::from_millis(120)).await;
        tx.send(true).unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.exit, WorkerExit::Stopped);
        assert!(report.executed < 100);
        let records = ctx.sink.records(id, "iceberg_polaris").await.unwrap();
        assert_eq!(records.len(), report.executed);
    }
}
