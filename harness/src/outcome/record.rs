//! Outcome of a single operation attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workload::{OperationKind, ScenarioId};

/// Immutable record of one dispatched operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub catalog_name: String,
    pub scenario: ScenarioId,
    pub worker_id: usize,
    pub operation_index: usize,
    pub operation_kind: OperationKind,
    pub success: bool,
    /// Wall time of the statement, never negative
    pub duration_seconds: f64,
    /// Rows touched, when the statement completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the statement was started
    pub timestamp: DateTime<Utc>,
}
