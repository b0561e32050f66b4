//! Catalog target and connection parameter types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection parameters for the shared query engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Query engine host
    pub host: String,
    /// Query engine HTTP port
    pub port: u16,
    /// User the statements run as
    pub user: String,
    /// Catalog name as registered in the query engine
    pub catalog: String,
    /// Default schema for unqualified names
    pub schema: String,
}

impl ConnectionParams {
    /// Base URL of the engine's HTTP endpoint
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A named catalog backend under test. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTarget {
    /// Identifier used in logs and reports
    pub name: String,
    pub params: ConnectionParams,
}

impl CatalogTarget {
    pub fn new(name: impl Into<String>, params: ConnectionParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

impl fmt::Display for CatalogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}@{}:{}/{}.{})",
            self.name,
            self.params.user,
            self.params.host,
            self.params.port,
            self.params.catalog,
            self.params.schema
        )
    }
}

/// Result of one successfully executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows returned by a query (empty for DML)
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Row count reported by the engine for INSERT/UPDATE/DELETE
    pub update_count: Option<u64>,
}

impl QueryResult {
    /// Rows touched by the statement: the engine's update count for DML,
    /// otherwise the number of rows returned.
    pub fn rows_affected(&self) -> u64 {
        self.update_count.unwrap_or(self.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "localhost".to_string(),
            port: 8081,
            user: "admin".to_string(),
            catalog: "iceberg_nessie".to_string(),
            schema: "default".to_string(),
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(params().base_url(), "http://localhost:8081");
    }

    #[test]
    fn test_rows_affected_prefers_update_count() {
        let dml = QueryResult {
            rows: vec![],
            update_count: Some(0),
        };
        assert_eq!(dml.rows_affected(), 0);

        let select = QueryResult {
            rows: vec![vec![serde_json::json!(1)], vec![serde_json::json!(2)]],
            update_count: None,
        };
        assert_eq!(select.rows_affected(), 2);
    }

    #[test]
    fn test_target_display() {
        let target = CatalogTarget::new("nessie", params());
        assert_eq!(
            target.to_string(),
            "nessie (admin@localhost:8081/iceberg_nessie.default)"
        );
    }
}
