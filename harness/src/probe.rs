//! Connectivity probe and two-phase run policy
//!
//! Every catalog is probed once before any load is generated. The probe
//! decides how much of the plan runs:
//! - all catalogs answer: the full plan
//! - some answer: a reduced light-insert plan against the reachable ones
//! - none answer: nothing runs and the run fails

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::catalog::{CatalogTarget, ConnectionProvider};
use crate::error::{ConnectionError, HarnessError};
use crate::report::RunReport;
use crate::runner::{Scheduler, SchedulerOptions};
use crate::workload::{LoadTier, OperationGenerator, Scenario, ScenarioKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub catalog: String,
    pub reachable: bool,
    pub duration_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    Full,
    Reduced,
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    pub outcomes: Vec<ProbeOutcome>,
}

impl ProbeReport {
    pub fn reachable(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.reachable)
            .map(|o| o.catalog.as_str())
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.reachable)
            .map(|o| o.catalog.as_str())
    }

    pub fn policy(&self) -> RunPolicy {
        let up = self.reachable().count();
        if up == 0 {
            RunPolicy::Abort
        } else if up == self.outcomes.len() {
            RunPolicy::Full
        } else {
            RunPolicy::Reduced
        }
    }
}

/// Open one connection per catalog. Each open runs the provider's own
/// round trip (`SHOW SCHEMAS` for Trino) bounded by `timeout`.
pub async fn probe_targets(
    provider: &dyn ConnectionProvider,
    targets: &[CatalogTarget],
    timeout: Duration,
) -> ProbeReport {
    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, provider.connect(target)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(ConnectionError::Timeout {
                target: target.name.clone(),
                after: timeout,
            }),
        };
        let duration_s = start.elapsed().as_secs_f64();

        let outcome = match result {
            Ok(()) => {
                info!("Catalog {} reachable ({:.2}s)", target.name, duration_s);
                ProbeOutcome {
                    catalog: target.name.clone(),
                    reachable: true,
                    duration_s,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Catalog {} failed connectivity probe: {}", target.name, e);
                ProbeOutcome {
                    catalog: target.name.clone(),
                    reachable: false,
                    duration_s,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }
    ProbeReport { outcomes }
}

/// Plan that runs when only some catalogs answered the probe
pub fn reduced_plan() -> Vec<Scenario> {
    LoadTier::Light.plan(&[ScenarioKind::Insert])
}

/// Probe result plus the run it led to, if any
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub probe: ProbeReport,
    pub policy: RunPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunReport>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.policy == RunPolicy::Full && self.run.as_ref().is_some_and(RunReport::success)
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &std::path::Path) -> Result<(), HarnessError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Probe every catalog, pick a policy and run the matching plan
pub async fn run_with_probe(
    provider: Arc<dyn ConnectionProvider>,
    targets: Vec<CatalogTarget>,
    generator: OperationGenerator,
    options: SchedulerOptions,
    plan: &[Scenario],
) -> Result<RunOutcome, HarnessError> {
    let probe = probe_targets(provider.as_ref(), &targets, options.connect_timeout).await;
    let policy = probe.policy();

    let (targets, plan) = match policy {
        RunPolicy::Full => {
            info!("All {} catalogs reachable, running full plan", targets.len());
            (targets, plan.to_vec())
        }
        RunPolicy::Reduced => {
            let skipped: Vec<&str> = probe.unreachable().collect();
            warn!(
                "Catalogs unreachable: {}. Running reduced plan on the rest",
                skipped.join(", ")
            );
            let reachable: Vec<CatalogTarget> = targets
                .into_iter()
                .filter(|t| probe.reachable().any(|name| name == t.name))
                .collect();
            (reachable, reduced_plan())
        }
        RunPolicy::Abort => {
            error!("No catalog answered the connectivity probe, nothing to run");
            return Ok(RunOutcome {
                probe,
                policy,
                run: None,
            });
        }
    };

    let scheduler = Scheduler::new(provider, targets, generator, options);
    let mut run = scheduler.run(&plan).await?;
    if policy == RunPolicy::Reduced {
        run.skipped_catalogs = probe.unreachable().map(str::to_string).collect();
        run.reduced_plan = true;
    }

    Ok(RunOutcome {
        probe,
        policy,
        run: Some(run),
    })
}
