//! Trino client over the engine's HTTP statement protocol
//!
//! A statement is `POST`ed to `/v1/statement`; the engine answers with a
//! page that may carry rows and a `nextUri`. Pages are followed until the
//! `nextUri` disappears, at which point the query is finished (or failed,
//! in which case the last page carries an `error` object).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::connection::{ConnectionProvider, SqlConnection};
use super::types::{CatalogTarget, ConnectionParams, QueryResult};
use crate::error::{ConnectionError, ExecutionError};

/// Value sent in `X-Trino-Source`
const CLIENT_SOURCE: &str = "catalog-stress";

/// Pause between polls while the query is still queued
const QUEUED_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Ceiling for the backoff after a gateway status
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive 502/503/504 answers tolerated on one request
const UNAVAILABLE_RETRIES: u32 = 10;

/// One page of the statement protocol
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementPage {
    id: String,
    next_uri: Option<String>,
    #[serde(default)]
    data: Option<Vec<Vec<serde_json::Value>>>,
    error: Option<QueryErrorInfo>,
    update_count: Option<u64>,
    stats: Option<StatementStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryErrorInfo {
    message: String,
    error_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementStats {
    state: String,
}

/// Provider that opens one HTTP client per worker handle
#[derive(Debug, Clone)]
pub struct TrinoProvider {
    connect_timeout: Duration,
}

impl TrinoProvider {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ConnectionProvider for TrinoProvider {
    async fn connect(
        &self,
        target: &CatalogTarget,
    ) -> Result<Box<dyn SqlConnection>, ConnectionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|source| ConnectionError::Transport {
                target: target.name.clone(),
                source,
            })?;

        let mut conn = TrinoConnection {
            client,
            params: target.params.clone(),
            unavailable_retries: UNAVAILABLE_RETRIES,
        };

        // The HTTP protocol is connectionless; prove the catalog answers
        // before handing the handle to a worker.
        let probe = format!(
            "SHOW SCHEMAS FROM {}",
            quote_identifier(&target.params.catalog)
        );
        match conn.execute(&probe).await {
            Ok(result) => {
                debug!(
                    "Catalog {} reachable, {} schemas visible",
                    target.name,
                    result.rows.len()
                );
                Ok(Box::new(conn))
            }
            Err(ExecutionError::Transport(source)) => Err(ConnectionError::Transport {
                target: target.name.clone(),
                source,
            }),
            Err(e) => Err(ConnectionError::Rejected {
                target: target.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// A single worker's handle to the engine, scoped to one catalog
pub struct TrinoConnection {
    client: reqwest::Client,
    params: ConnectionParams,
    unavailable_retries: u32,
}

impl TrinoConnection {
    fn post_statement(&self, statement: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/statement", self.params.base_url()))
            .header("X-Trino-User", &self.params.user)
            .header("X-Trino-Catalog", &self.params.catalog)
            .header("X-Trino-Schema", &self.params.schema)
            .header("X-Trino-Source", CLIENT_SOURCE)
            .body(statement.to_string())
    }

    /// Send one protocol request. Gateway statuses mean the coordinator is
    /// shedding load while the query stays live, so the same request is
    /// replayed with backoff instead of failing the statement.
    async fn fetch_page(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<StatementPage, ExecutionError> {
        let mut attempt = 0;
        loop {
            let replay = request.try_clone().ok_or_else(|| {
                ExecutionError::Protocol("request body cannot be replayed".to_string())
            })?;
            let response = replay.send().await?;
            let status = response.status();
            if is_retryable(status) && attempt < self.unavailable_retries {
                let delay = retry_delay(attempt);
                debug!(
                    "Engine answered {} for {}, retrying in {:?}",
                    status,
                    self.params.catalog,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            let response = response.error_for_status()?;
            return Ok(response.json::<StatementPage>().await?);
        }
    }
}

#[async_trait]
impl SqlConnection for TrinoConnection {
    async fn execute(&mut self, statement: &str) -> Result<QueryResult, ExecutionError> {
        let mut page = self.fetch_page(self.post_statement(statement)).await?;
        let mut result = QueryResult::default();

        loop {
            absorb_page(&mut result, &mut page)?;

            let Some(next_uri) = page.next_uri.take() else {
                return Ok(result);
            };

            if page.stats.as_ref().is_some_and(|s| s.state == "QUEUED") {
                tokio::time::sleep(QUEUED_POLL_INTERVAL).await;
            }

            let request = self
                .client
                .get(&next_uri)
                .header("X-Trino-User", &self.params.user);
            page = self.fetch_page(request).await?;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Doubling backoff starting at the queued poll interval
fn retry_delay(attempt: u32) -> Duration {
    QUEUED_POLL_INTERVAL
        .saturating_mul(1u32 << attempt.min(8))
        .min(MAX_RETRY_INTERVAL)
}

/// Fold one page into the accumulated result, surfacing engine errors
fn absorb_page(result: &mut QueryResult, page: &mut StatementPage) -> Result<(), ExecutionError> {
    if let Some(error) = page.error.take() {
        return Err(ExecutionError::Query {
            name: error.error_name.unwrap_or_else(|| "UNKNOWN".to_string()),
            message: error.message,
        });
    }
    if page.id.is_empty() {
        return Err(ExecutionError::Protocol(
            "statement page without query id".to_string(),
        ));
    }
    if let Some(rows) = page.data.take() {
        result.rows.extend(rows);
    }
    if page.update_count.is_some() {
        result.update_count = page.update_count;
    }
    Ok(())
}

/// Quote an identifier for use in SQL text
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
