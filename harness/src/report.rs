//! Run report: data model, console rendering and JSON output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HarnessError;
use crate::outcome::{OutcomeRecord, SummaryStats};
use crate::workload::{OperationKind, Scenario, ScenarioId};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const WIDTH: usize = 63;
const MAX_ERROR_CHARS: usize = 160;

/// One failed operation kept for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSample {
    pub worker_id: usize,
    pub operation_index: usize,
    pub operation_kind: OperationKind,
    pub error: String,
}

impl From<&OutcomeRecord> for FailureSample {
    fn from(record: &OutcomeRecord) -> Self {
        Self {
            worker_id: record.worker_id,
            operation_index: record.operation_index,
            operation_kind: record.operation_kind,
            error: record.error_message.clone().unwrap_or_default(),
        }
    }
}

/// Outcome of one catalog within one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetReport {
    #[serde(flatten)]
    pub stats: SummaryStats,
    /// Total failed operations; `failure_sample` holds the first few
    pub failure_count: usize,
    pub failure_sample: Vec<FailureSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub id: ScenarioId,
    pub scenario: Scenario,
    pub wall_secs: f64,
    pub timed_out: bool,
    pub targets: Vec<TargetReport>,
}

impl ScenarioReport {
    /// Catalogs with at least one success, fastest average first
    pub fn ranking(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .targets
            .iter()
            .filter_map(|t| t.stats.avg_s.map(|avg| (t.stats.catalog_name.as_str(), avg)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked
    }

    /// Catalogs that attempted anything, highest success rate first
    pub fn reliability(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .targets
            .iter()
            .filter(|t| t.stats.total > 0)
            .map(|t| (t.stats.catalog_name.as_str(), t.stats.success_rate()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub wall_secs: f64,
    /// Catalogs the plan ran against
    pub catalogs: Vec<String>,
    /// Catalogs dropped by the connectivity probe
    #[serde(default)]
    pub skipped_catalogs: Vec<String>,
    /// True when only the reduced plan ran
    #[serde(default)]
    pub reduced_plan: bool,
    pub scenarios: Vec<ScenarioReport>,
}

impl RunReport {
    /// Every catalog was probed successfully and had at least one
    /// reachable worker in every scenario
    pub fn success(&self) -> bool {
        self.skipped_catalogs.is_empty()
            && !self.catalogs.is_empty()
            && self
                .scenarios
                .iter()
                .all(|s| s.targets.iter().all(|t| t.stats.reachable()))
    }

    /// Flat list of per-catalog statistics in run order
    pub fn summaries(&self) -> impl Iterator<Item = &SummaryStats> {
        self.scenarios
            .iter()
            .flat_map(|s| s.targets.iter().map(|t| &t.stats))
    }

    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary for the console
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push('\n');
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!(" CATALOG STRESS TEST RESULTS (run {})\n", self.run_id));
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!("   Started:   {}\n", self.started_at.to_rfc3339()));
        out.push_str(&format!("   Duration:  {:.2}s\n", self.wall_secs));
        out.push_str(&format!("   Catalogs:  {}\n", self.catalogs.join(", ")));
        if !self.skipped_catalogs.is_empty() {
            out.push_str(&format!(
                "   Skipped:   {} (failed connectivity probe)\n",
                self.skipped_catalogs.join(", ")
            ));
        }
        if self.reduced_plan {
            out.push_str("   Plan:      reduced (light insert only)\n");
        }

        for scenario in &self.scenarios {
            out.push('\n');
            render_scenario(&mut out, scenario);
        }

        out.push('\n');
        out.push_str(RULE);
        out.push('\n');
        out.push_str(&format!(" OVERALL: {}\n", self.verdict()));
        out.push_str(RULE);
        out.push('\n');
        out
    }

    fn verdict(&self) -> String {
        if self.success() {
            return "PASS".to_string();
        }
        let mut unreachable: Vec<&str> = self.skipped_catalogs.iter().map(String::as_str).collect();
        for stats in self.summaries() {
            if !stats.reachable() && !unreachable.contains(&stats.catalog_name.as_str()) {
                unreachable.push(&stats.catalog_name);
            }
        }
        if unreachable.is_empty() {
            "FAIL".to_string()
        } else {
            format!("FAIL (unreachable: {})", unreachable.join(", "))
        }
    }
}

fn section(title: &str) -> String {
    let head = format!(" ─── {title} ");
    let fill = WIDTH.saturating_sub(head.chars().count());
    format!("{head}{}\n", "─".repeat(fill))
}

fn render_scenario(out: &mut String, report: &ScenarioReport) {
    let s = &report.scenario;
    out.push_str(&section(&format!(
        "{} ({} threads x {} ops, batch {})",
        report.id, s.thread_count, s.operations_per_thread, s.batch_size
    )));
    out.push_str(&format!(
        "   Wall time: {:.2}s, delay {}\n",
        report.wall_secs, s.delay_range
    ));
    if report.timed_out {
        out.push_str("   Timed out: workers stopped early, partial results below\n");
    }

    for target in &report.targets {
        out.push('\n');
        render_target(out, target, report.wall_secs);
    }

    let ranking = report.ranking();
    if let Some((fastest, fastest_avg)) = ranking.first() {
        out.push('\n');
        out.push_str(&format!("   Fastest: {} (avg {:.3}s)\n", fastest, fastest_avg));
        for (name, avg) in ranking.iter().skip(1) {
            let slower = if *fastest_avg > 0.0 {
                (avg / fastest_avg - 1.0) * 100.0
            } else {
                0.0
            };
            out.push_str(&format!("     {}: {:.1}% slower\n", name, slower));
        }
    }

    let reliability = report.reliability();
    if let Some((best, best_rate)) = reliability.first() {
        out.push_str(&format!(
            "   Most reliable: {} ({:.1}% success)\n",
            best,
            best_rate * 100.0
        ));
        for (name, rate) in reliability.iter().skip(1) {
            out.push_str(&format!("     {}: {:.1}% success\n", name, rate * 100.0));
        }
    }
}

fn render_target(out: &mut String, target: &TargetReport, wall_secs: f64) {
    let stats = &target.stats;
    out.push_str(&format!("   {}\n", stats.catalog_name));

    if !stats.reachable() {
        out.push_str(&format!(
            "     UNREACHABLE ({}/{} workers could not connect)\n",
            stats.unreachable_workers, stats.workers
        ));
        return;
    }

    out.push_str(&format!(
        "     Operations:  {} total, {} succeeded ({:.1}%), {} failed\n",
        stats.total,
        stats.succeeded,
        stats.success_rate() * 100.0,
        stats.failed
    ));
    if stats.unreachable_workers > 0 {
        out.push_str(&format!(
            "     Workers:     {}/{} could not connect\n",
            stats.unreachable_workers, stats.workers
        ));
    }
    match (stats.avg_s, stats.median_s, stats.min_s, stats.max_s) {
        (Some(avg), Some(median), Some(min), Some(max)) => {
            out.push_str(&format!(
                "     Durations:   avg {:.3}s  median {:.3}s  min {:.3}s  max {:.3}s  stddev {:.3}s\n",
                avg,
                median,
                min,
                max,
                stats.stddev_s.unwrap_or(0.0)
            ));
        }
        _ => out.push_str("     Durations:   n/a (no successful operations)\n"),
    }
    out.push_str(&format!(
        "     Rows:        {} ({:.1} rows/s)\n",
        stats.rows_affected,
        stats.throughput(wall_secs)
    ));

    if target.failure_count > 0 {
        out.push_str("     Failures:\n");
        for failure in &target.failure_sample {
            out.push_str(&format!(
                "       - w{} op {} {}: {}\n",
                failure.worker_id,
                failure.operation_index,
                failure.operation_kind,
                truncate(&failure.error, MAX_ERROR_CHARS)
            ));
        }
        let omitted = target.failure_count.saturating_sub(target.failure_sample.len());
        if omitted > 0 {
            out.push_str(&format!("       ... and {} more\n", omitted));
        }
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    let line = message.lines().next().unwrap_or_default();
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
