//! Scenario definitions and load tier presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::HarnessError;

/// Upper bound on concurrent workers per catalog
pub const MAX_THREADS: usize = 100_000;

/// Upper bound on rows a single worker may touch in one scenario
pub const MAX_ROWS_PER_WORKER: u64 = 1_000_000_000;

/// Upper bound on a single inter-operation pause, in seconds
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Operation kind driving a scenario phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Insert,
    Update,
    Delete,
    Mixed,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 4] = [
        ScenarioKind::Insert,
        ScenarioKind::Update,
        ScenarioKind::Delete,
        ScenarioKind::Mixed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Insert => "insert",
            ScenarioKind::Update => "update",
            ScenarioKind::Delete => "delete",
            ScenarioKind::Mixed => "mixed",
        }
    }

    /// Whether workers intentionally touch rows owned by other workers
    pub fn is_contended(&self) -> bool {
        matches!(self, ScenarioKind::Mixed)
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "insert" => Ok(ScenarioKind::Insert),
            "update" => Ok(ScenarioKind::Update),
            "delete" => Ok(ScenarioKind::Delete),
            "mixed" => Ok(ScenarioKind::Mixed),
            other => Err(HarnessError::contract(format!(
                "unknown scenario kind: {other:?}"
            ))),
        }
    }
}

/// Inclusive range of inter-operation jitter, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_secs: 0.0,
        max_secs: 0.0,
    };

    pub fn new(min_secs: f64, max_secs: f64) -> Result<Self, HarnessError> {
        let range = Self { min_secs, max_secs };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), HarnessError> {
        if !self.min_secs.is_finite() || !self.max_secs.is_finite() {
            return Err(HarnessError::contract("delay range must be finite"));
        }
        if self.min_secs < 0.0 {
            return Err(HarnessError::contract(format!(
                "delay range minimum must be >= 0, got {}",
                self.min_secs
            )));
        }
        if self.min_secs > self.max_secs {
            return Err(HarnessError::contract(format!(
                "delay range minimum {} exceeds maximum {}",
                self.min_secs, self.max_secs
            )));
        }
        if self.max_secs > MAX_DELAY_SECS {
            return Err(HarnessError::contract(format!(
                "delay range maximum must be <= {MAX_DELAY_SECS}s, got {}",
                self.max_secs
            )));
        }
        Ok(())
    }

    /// Map a unit sample in `[0, 1]` onto the range
    pub fn at(&self, unit: f64) -> Duration {
        let secs = self.min_secs + (self.max_secs - self.min_secs) * unit.clamp(0.0, 1.0);
        // Unvalidated ranges saturate instead of panicking
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for DelayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}s-{:.2}s", self.min_secs, self.max_secs)
    }
}

/// One phase of a stress run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub kind: ScenarioKind,
    /// Workers per catalog target
    pub thread_count: usize,
    /// Operations each worker executes sequentially
    pub operations_per_thread: usize,
    /// Rows per insert statement, width of the key slice for update/delete
    pub batch_size: usize,
    pub delay_range: DelayRange,
}

impl Scenario {
    /// Reject configurations that would make the run meaningless
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.thread_count == 0 || self.thread_count > MAX_THREADS {
            return Err(HarnessError::contract(format!(
                "{} scenario: thread_count must be in 1..={MAX_THREADS}, got {}",
                self.kind, self.thread_count
            )));
        }
        if self.operations_per_thread == 0 {
            return Err(HarnessError::contract(format!(
                "{} scenario: operations_per_thread must be positive",
                self.kind
            )));
        }
        if self.batch_size == 0 {
            return Err(HarnessError::contract(format!(
                "{} scenario: batch_size must be positive",
                self.kind
            )));
        }
        let rows = (self.operations_per_thread as u64).checked_mul(self.batch_size as u64);
        if rows.is_none_or(|r| r > MAX_ROWS_PER_WORKER) {
            return Err(HarnessError::contract(format!(
                "{} scenario: operations_per_thread x batch_size exceeds {MAX_ROWS_PER_WORKER}",
                self.kind
            )));
        }
        self.delay_range.validate()
    }

    /// Operations dispatched per catalog target
    pub fn operations_per_catalog(&self) -> usize {
        self.thread_count * self.operations_per_thread
    }

    /// Rows written per catalog when every insert succeeds
    pub fn rows_per_catalog(&self) -> usize {
        self.operations_per_catalog() * self.batch_size
    }
}

/// Position of a scenario within a run plus its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioId {
    pub ordinal: usize,
    pub kind: ScenarioKind,
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.ordinal + 1, self.kind)
    }
}

/// Load presets for a full scenario suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTier {
    /// Few workers, long pauses
    Light,
    /// Default suite
    Medium,
    /// Many workers, short pauses
    Heavy,
}

impl LoadTier {
    pub fn name(&self) -> &'static str {
        match self {
            LoadTier::Light => "LIGHT",
            LoadTier::Medium => "MEDIUM",
            LoadTier::Heavy => "HEAVY",
        }
    }

    /// Preset for one scenario kind at this tier
    pub fn scenario(&self, kind: ScenarioKind) -> Scenario {
        let (thread_count, operations_per_thread, batch_size, (min, max)) = match (self, kind) {
            (LoadTier::Light, ScenarioKind::Insert) => (3, 5, 50, (0.5, 1.5)),
            (LoadTier::Light, ScenarioKind::Update) => (2, 15, 50, (0.5, 1.5)),
            (LoadTier::Light, ScenarioKind::Delete) => (2, 10, 50, (0.5, 1.5)),
            (LoadTier::Light, ScenarioKind::Mixed) => (2, 8, 25, (0.1, 0.8)),
            (LoadTier::Medium, ScenarioKind::Insert) => (5, 8, 100, (0.2, 1.0)),
            (LoadTier::Medium, ScenarioKind::Update) => (3, 40, 100, (0.2, 1.0)),
            (LoadTier::Medium, ScenarioKind::Delete) => (3, 20, 100, (0.2, 1.0)),
            (LoadTier::Medium, ScenarioKind::Mixed) => (4, 5, 25, (0.1, 0.8)),
            (LoadTier::Heavy, ScenarioKind::Insert) => (8, 10, 150, (0.1, 0.5)),
            (LoadTier::Heavy, ScenarioKind::Update) => (5, 80, 150, (0.1, 0.5)),
            (LoadTier::Heavy, ScenarioKind::Delete) => (5, 30, 150, (0.1, 0.5)),
            (LoadTier::Heavy, ScenarioKind::Mixed) => (6, 10, 25, (0.1, 0.5)),
        };
        Scenario {
            kind,
            thread_count,
            operations_per_thread,
            batch_size,
            delay_range: DelayRange {
                min_secs: min,
                max_secs: max,
            },
        }
    }

    /// Presets for the given kinds, in order
    pub fn plan(&self, kinds: &[ScenarioKind]) -> Vec<Scenario> {
        kinds.iter().map(|kind| self.scenario(*kind)).collect()
    }
}

impl FromStr for LoadTier {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(LoadTier::Light),
            "medium" => Ok(LoadTier::Medium),
            "heavy" => Ok(LoadTier::Heavy),
            other => Err(HarnessError::contract(format!("unknown load tier: {other:?}"))),
        }
    }
}
