//! Test Utilities Module
//!
//! Scripted in-memory SQL provider and fixtures shared by unit tests.
//! This module is only compiled when running tests.

#![cfg(test)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::{CatalogTarget, ConnectionParams, ConnectionProvider, QueryResult, SqlConnection};
use crate::error::{ConnectionError, ExecutionError};
use crate::workload::{DelayRange, OperationGenerator, Scenario, ScenarioKind};

// ============================================================================
// Scripted Provider
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Script {
    unreachable: HashSet<String>,
    hanging: HashSet<String>,
    fail_every: HashMap<String, usize>,
    zero_rows: HashSet<String>,
    panicking: HashSet<String>,
    latency: Duration,
}

/// Provider whose catalogs behave according to a script. Clones share the
/// statement log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Script>,
    log: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect to `catalog` is rejected
    pub fn unreachable(mut self, catalog: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .unreachable
            .insert(catalog.to_string());
        self
    }

    /// Connects to `catalog` never complete
    pub fn hang_on_connect(mut self, catalog: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .hanging
            .insert(catalog.to_string());
        self
    }

    /// Every `n`th statement on `catalog` fails
    pub fn fail_every(mut self, catalog: &str, n: usize) -> Self {
        Arc::make_mut(&mut self.script)
            .fail_every
            .insert(catalog.to_string(), n.max(1));
        self
    }

    /// Writes on `catalog` report zero affected rows
    pub fn zero_rows(mut self, catalog: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .zero_rows
            .insert(catalog.to_string());
        self
    }

    /// Executing any statement on `catalog` panics the worker task
    pub fn panic_on_execute(mut self, catalog: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .panicking
            .insert(catalog.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        Arc::make_mut(&mut self.script).latency = latency;
        self
    }

    /// Statements executed against `catalog`, in arrival order
    pub fn statements(&self, catalog: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .get(catalog)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    async fn connect(
        &self,
        target: &CatalogTarget,
    ) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        if self.script.hanging.contains(&target.name) {
            std::future::pending::<()>().await;
        }
        if self.script.unreachable.contains(&target.name) {
            return Err(ConnectionError::Rejected {
                target: target.name.clone(),
                message: "scripted outage".to_string(),
            });
        }
        Ok(Box::new(ScriptedConnection {
            catalog: target.name.clone(),
            provider: self.clone(),
        }))
    }
}

struct ScriptedConnection {
    catalog: String,
    provider: ScriptedProvider,
}

#[async_trait]
impl SqlConnection for ScriptedConnection {
    async fn execute(&mut self, statement: &str) -> Result<QueryResult, ExecutionError> {
        let script = &self.provider.script;
        if !script.latency.is_zero() {
            tokio::time::sleep(script.latency).await;
        }

        let seen = {
            let mut log = self.provider.log.lock().unwrap();
            let entry = log.entry(self.catalog.clone()).or_default();
            entry.push(statement.to_string());
            entry.len()
        };

        if script.panicking.contains(&self.catalog) {
            panic!("scripted panic on {}", self.catalog);
        }
        if let Some(every) = script.fail_every.get(&self.catalog)
            && seen % every == 0
        {
            return Err(ExecutionError::Query {
                name: "SCRIPTED_FAILURE".to_string(),
                message: format!("statement {seen} rejected"),
            });
        }

        Ok(scripted_result(
            statement,
            script.zero_rows.contains(&self.catalog),
        ))
    }
}

fn scripted_result(statement: &str, zero_rows: bool) -> QueryResult {
    if statement.starts_with("SELECT") {
        return QueryResult {
            rows: vec![vec![serde_json::json!(1)]],
            update_count: None,
        };
    }
    let count = if zero_rows {
        0
    } else if statement.starts_with("INSERT") {
        statement.matches("), (").count() as u64 + 1
    } else {
        1
    };
    QueryResult {
        rows: Vec::new(),
        update_count: Some(count),
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn test_params(catalog: &str) -> ConnectionParams {
    ConnectionParams {
        host: "localhost".to_string(),
        port: 8081,
        user: "admin".to_string(),
        catalog: catalog.to_string(),
        schema: "default".to_string(),
    }
}

pub fn test_target(name: &str) -> Arc<CatalogTarget> {
    Arc::new(CatalogTarget::new(name, test_params(name)))
}

pub fn test_generator() -> OperationGenerator {
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    OperationGenerator::new("stress_test.catalog_stress", 7, date)
}

/// Insert scenario without jitter
pub fn insert_scenario(threads: usize, ops: usize, batch: usize) -> Scenario {
    Scenario {
        kind: ScenarioKind::Insert,
        thread_count: threads,
        operations_per_thread: ops,
        batch_size: batch,
        delay_range: DelayRange::ZERO,
    }
}

/// Initialize test logging with detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_stress=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures_and_log() {
        init_test_logging();
        let provider = ScriptedProvider::new().fail_every("iceberg_hms", 2);
        let mut conn = provider.connect(&test_target("iceberg_hms")).await.unwrap();

        assert!(conn.execute("INSERT INTO t VALUES (1), (2)").await.is_ok());
        assert!(conn.execute("DELETE FROM t").await.is_err());
        assert_eq!(provider.statements("iceberg_hms").len(), 2);
        assert!(provider.statements("iceberg_polaris").is_empty());
    }

    #[tokio::test]
    async fn test_scripted_row_counts() {
        let provider = ScriptedProvider::new().zero_rows("iceberg_nessie");
        let mut conn = provider.connect(&test_target("iceberg_polaris")).await.unwrap();
        let insert = conn.execute("INSERT INTO t VALUES (1), (2), (3)").await.unwrap();
        assert_eq!(insert.rows_affected(), 3);

        let mut empty = provider.connect(&test_target("iceberg_nessie")).await.unwrap();
        let delete = empty.execute("DELETE FROM t WHERE id = 1").await.unwrap();
        assert_eq!(delete.rows_affected(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_connect() {
        let provider = ScriptedProvider::new().unreachable("iceberg_hms");
        let err = provider.connect(&test_target("iceberg_hms")).await.err().unwrap();
        assert_eq!(err.target(), "iceberg_hms");
    }
}
