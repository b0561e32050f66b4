//! Harness configuration
//!
//! Configuration is loaded from environment variables. Unlike a long-running
//! service the harness refuses to start on a malformed value: every parse
//! error is a contract violation, and the assembled configuration is
//! validated before any worker is dispatched.

use std::collections::HashSet;
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::catalog::{CatalogTarget, ConnectionParams};
use crate::error::HarnessError;
use crate::runner::{MAX_SCENARIOS, SchedulerOptions};
use crate::workload::{DelayRange, LoadTier, Scenario, ScenarioKind};

/// Main harness configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Query engine connection defaults
    pub trino: TrinoConfig,
    /// Catalog identifiers under test
    pub catalogs: Vec<String>,
    /// Workload configuration
    pub workload: WorkloadConfig,
    /// Run-level limits and outputs
    pub run: RunConfig,
}

/// Connection defaults shared by every catalog target
#[derive(Debug, Clone)]
pub struct TrinoConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub schema: String,
}

/// What load to generate
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Fully qualified table within each catalog
    pub table: String,
    /// Preset the plan starts from
    pub tier: LoadTier,
    /// Scenario kinds, in execution order
    pub scenarios: Vec<ScenarioKind>,
    /// Knobs replacing the preset for every scenario
    pub overrides: ScenarioOverrides,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioOverrides {
    pub threads: Option<usize>,
    pub operations: Option<usize>,
    pub batch_size: Option<usize>,
    pub delay_min_secs: Option<f64>,
    pub delay_max_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Time allowed per scenario before workers are stopped
    pub scenario_timeout: Duration,
    /// Time allowed for a single connection attempt
    pub connect_timeout: Duration,
    /// Seed for generated row content and jitter
    pub seed: u64,
    /// Where to write the JSON report (optional)
    pub report_json: Option<PathBuf>,
    /// Prometheus scrape listener (optional)
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trino: TrinoConfig::default(),
            catalogs: vec![
                "iceberg_polaris".to_string(),
                "iceberg_hms".to_string(),
                "iceberg_nessie".to_string(),
            ],
            workload: WorkloadConfig::default(),
            run: RunConfig::default(),
        }
    }
}

impl Default for TrinoConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8081,
            user: "admin".to_string(),
            schema: "default".to_string(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            table: "stress_test.catalog_stress".to_string(),
            tier: LoadTier::Medium,
            scenarios: ScenarioKind::ALL.to_vec(),
            overrides: ScenarioOverrides::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            seed: 0,
            report_json: None,
            metrics_addr: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        // Trino
        if let Some(host) = get("TRINO_HOST") {
            config.trino.host = host;
        }
        if let Some(val) = get("TRINO_PORT") {
            config.trino.port = parse("TRINO_PORT", &val)?;
        }
        if let Some(user) = get("TRINO_USER") {
            config.trino.user = user;
        }
        if let Some(schema) = get("TRINO_SCHEMA") {
            config.trino.schema = schema;
        }

        // Catalogs
        if let Some(val) = get("STRESS_CATALOGS") {
            config.catalogs = split_list(&val).map(str::to_string).collect();
        }

        // Workload
        if let Some(table) = get("STRESS_TABLE") {
            config.workload.table = table;
        }
        if let Some(val) = get("STRESS_TIER") {
            config.workload.tier = val.parse()?;
        }
        if let Some(val) = get("STRESS_SCENARIOS") {
            config.workload.scenarios = split_list(&val)
                .map(|kind| kind.parse::<ScenarioKind>())
                .collect::<Result<_, _>>()?;
        }
        let overrides = &mut config.workload.overrides;
        if let Some(val) = get("STRESS_THREADS") {
            overrides.threads = Some(parse("STRESS_THREADS", &val)?);
        }
        if let Some(val) = get("STRESS_OPERATIONS") {
            overrides.operations = Some(parse("STRESS_OPERATIONS", &val)?);
        }
        if let Some(val) = get("STRESS_BATCH_SIZE") {
            overrides.batch_size = Some(parse("STRESS_BATCH_SIZE", &val)?);
        }
        if let Some(val) = get("STRESS_DELAY_MIN_SECS") {
            overrides.delay_min_secs = Some(parse("STRESS_DELAY_MIN_SECS", &val)?);
        }
        if let Some(val) = get("STRESS_DELAY_MAX_SECS") {
            overrides.delay_max_secs = Some(parse("STRESS_DELAY_MAX_SECS", &val)?);
        }

        // Run
        if let Some(val) = get("STRESS_SCENARIO_TIMEOUT_SECS") {
            config.run.scenario_timeout =
                Duration::from_secs(parse("STRESS_SCENARIO_TIMEOUT_SECS", &val)?);
        }
        if let Some(val) = get("STRESS_CONNECT_TIMEOUT_SECS") {
            config.run.connect_timeout =
                Duration::from_secs(parse("STRESS_CONNECT_TIMEOUT_SECS", &val)?);
        }
        if let Some(val) = get("STRESS_SEED") {
            config.run.seed = parse("STRESS_SEED", &val)?;
        }
        if let Some(path) = get("STRESS_REPORT_JSON") {
            config.run.report_json = Some(PathBuf::from(path));
        }
        if let Some(val) = get("METRICS_ADDR") {
            config.run.metrics_addr = Some(parse("METRICS_ADDR", &val)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked before connecting
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.catalogs.is_empty() {
            return Err(HarnessError::contract("at least one catalog is required"));
        }
        let mut seen = HashSet::new();
        for name in &self.catalogs {
            if !seen.insert(name.as_str()) {
                return Err(HarnessError::contract(format!("duplicate catalog {name}")));
            }
        }
        if self.workload.table.trim().is_empty() {
            return Err(HarnessError::contract("table name must not be empty"));
        }
        if self.workload.scenarios.is_empty() {
            return Err(HarnessError::contract("at least one scenario is required"));
        }
        if self.workload.scenarios.len() > MAX_SCENARIOS {
            return Err(HarnessError::contract(format!(
                "at most {MAX_SCENARIOS} scenarios supported"
            )));
        }
        if self.run.scenario_timeout.is_zero() || self.run.connect_timeout.is_zero() {
            return Err(HarnessError::contract("timeouts must be positive"));
        }
        for scenario in self.plan() {
            scenario.validate()?;
        }
        Ok(())
    }

    /// One target per configured catalog, all sharing the connection defaults
    pub fn targets(&self) -> Vec<CatalogTarget> {
        self.catalogs
            .iter()
            .map(|name| {
                CatalogTarget::new(
                    name.clone(),
                    ConnectionParams {
                        host: self.trino.host.clone(),
                        port: self.trino.port,
                        user: self.trino.user.clone(),
                        catalog: name.clone(),
                        schema: self.trino.schema.clone(),
                    },
                )
            })
            .collect()
    }

    /// Tier presets for the configured scenario kinds, with overrides applied
    pub fn plan(&self) -> Vec<Scenario> {
        let overrides = &self.workload.overrides;
        self.workload
            .tier
            .plan(&self.workload.scenarios)
            .into_iter()
            .map(|mut scenario| {
                if let Some(threads) = overrides.threads {
                    scenario.thread_count = threads;
                }
                if let Some(ops) = overrides.operations {
                    scenario.operations_per_thread = ops;
                }
                if let Some(batch) = overrides.batch_size {
                    scenario.batch_size = batch;
                }
                scenario.delay_range = DelayRange {
                    min_secs: overrides
                        .delay_min_secs
                        .unwrap_or(scenario.delay_range.min_secs),
                    max_secs: overrides
                        .delay_max_secs
                        .unwrap_or(scenario.delay_range.max_secs),
                };
                scenario
            })
            .collect()
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            scenario_timeout: self.run.scenario_timeout,
            connect_timeout: self.run.connect_timeout,
            seed: self.run.seed,
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse<T>(key: &str, raw: &str) -> Result<T, HarnessError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| HarnessError::contract(format!("invalid {key}={raw:?}: {e}")))
}
