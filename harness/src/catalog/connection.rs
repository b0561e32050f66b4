//! SQL execution traits consumed by worker units

use async_trait::async_trait;

use super::types::{CatalogTarget, QueryResult};
use crate::error::{ConnectionError, ExecutionError};

/// A live SQL execution handle bound to one catalog target.
///
/// Handles are owned by exactly one worker unit and never shared.
#[async_trait]
pub trait SqlConnection: Send {
    /// Execute one statement to completion
    async fn execute(&mut self, statement: &str) -> Result<QueryResult, ExecutionError>;
}

/// Produces connection handles for catalog targets.
///
/// Implementations must not retry internally; a failed `connect` is
/// reported to the caller as-is.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Open a fresh handle for `target`
    async fn connect(
        &self,
        target: &CatalogTarget,
    ) -> Result<Box<dyn SqlConnection>, ConnectionError>;
}
