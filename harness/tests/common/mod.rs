//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_stress::{
    CatalogTarget, ConnectionError, ConnectionParams, ConnectionProvider, DelayRange,
    ExecutionError, OperationGenerator, QueryResult, Scenario, ScenarioKind, SchedulerOptions,
    SqlConnection,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Decides the result of every statement: `(catalog, statement)`
pub type Responder = dyn Fn(&str, &str) -> Result<QueryResult, ExecutionError> + Send + Sync;

/// In-memory stand-in for the query engine
#[derive(Clone)]
pub struct MockCatalogProvider {
    unreachable: Arc<HashSet<String>>,
    responder: Arc<Responder>,
    latency: Duration,
    executed: Arc<AtomicUsize>,
}

impl MockCatalogProvider {
    /// Every statement succeeds and touches one row
    pub fn healthy() -> Self {
        Self::with_responder(|_, _| Ok(rows(1)))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> Result<QueryResult, ExecutionError> + Send + Sync + 'static,
    {
        Self {
            unreachable: Arc::new(HashSet::new()),
            responder: Arc::new(responder),
            latency: Duration::ZERO,
            executed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unreachable(mut self, catalogs: &[&str]) -> Self {
        self.unreachable = Arc::new(catalogs.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Statements executed so far, across all catalogs
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProvider for MockCatalogProvider {
    async fn connect(
        &self,
        target: &CatalogTarget,
    ) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        if self.unreachable.contains(&target.name) {
            return Err(ConnectionError::Rejected {
                target: target.name.clone(),
                message: "Catalog 'missing' does not exist".to_string(),
            });
        }
        Ok(Box::new(MockConnection {
            catalog: target.name.clone(),
            provider: self.clone(),
        }))
    }
}

struct MockConnection {
    catalog: String,
    provider: MockCatalogProvider,
}

#[async_trait]
impl SqlConnection for MockConnection {
    async fn execute(&mut self, statement: &str) -> Result<QueryResult, ExecutionError> {
        if !self.provider.latency.is_zero() {
            tokio::time::sleep(self.provider.latency).await;
        }
        self.provider.executed.fetch_add(1, Ordering::SeqCst);
        (self.provider.responder)(&self.catalog, statement)
    }
}

/// Write result touching `count` rows
pub fn rows(count: u64) -> QueryResult {
    QueryResult {
        rows: Vec::new(),
        update_count: Some(count),
    }
}

pub fn query_error(name: &str, message: &str) -> ExecutionError {
    ExecutionError::Query {
        name: name.to_string(),
        message: message.to_string(),
    }
}

pub fn targets(names: &[&str]) -> Vec<CatalogTarget> {
    names
        .iter()
        .map(|name| {
            CatalogTarget::new(
                *name,
                ConnectionParams {
                    host: "localhost".to_string(),
                    port: 8081,
                    user: "admin".to_string(),
                    catalog: name.to_string(),
                    schema: "default".to_string(),
                },
            )
        })
        .collect()
}

pub fn all_catalogs() -> Vec<CatalogTarget> {
    targets(&["iceberg_polaris", "iceberg_hms", "iceberg_nessie"])
}

pub fn generator() -> OperationGenerator {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    OperationGenerator::new("stress_test.catalog_stress", 1234, date)
}

/// Scenario without jitter so tests run at full speed
pub fn scenario(kind: ScenarioKind, threads: usize, ops: usize, batch: usize) -> Scenario {
    Scenario {
        kind,
        thread_count: threads,
        operations_per_thread: ops,
        batch_size: batch,
        delay_range: DelayRange::ZERO,
    }
}

pub fn options() -> SchedulerOptions {
    SchedulerOptions {
        scenario_timeout: Duration::from_secs(30),
        connect_timeout: Duration::from_secs(2),
        seed: 99,
    }
}
