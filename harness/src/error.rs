//! Error taxonomy for the stress harness
//!
//! Backend-origin errors (`ConnectionError`, `ExecutionError`) are converted
//! into outcome records at the worker boundary. Only `ContractViolation`
//! (and configuration I/O) ever escapes a run.

use std::time::Duration;
use thiserror::Error;

/// A catalog target could not be reached when a worker started
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to reach catalog {target}: {source}")]
    Transport {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Catalog {target} rejected connection probe: {message}")]
    Rejected { target: String, message: String },

    #[error("Connection to catalog {target} timed out after {after:?}")]
    Timeout { target: String, after: Duration },
}

impl ConnectionError {
    /// Name of the catalog target this error belongs to
    pub fn target(&self) -> &str {
        match self {
            ConnectionError::Transport { target, .. }
            | ConnectionError::Rejected { target, .. }
            | ConnectionError::Timeout { target, .. } => target,
        }
    }
}

/// A single statement failed
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Query failed ({name}): {message}")]
    Query { name: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the harness itself
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A harness bug or malformed configuration. Fatal for the run.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn contract(message: impl Into<String>) -> Self {
        HarnessError::ContractViolation(message.into())
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, HarnessError::ContractViolation(_))
    }
}
