//! Catalog targets and SQL connectivity
//!
//! This module provides:
//! - `CatalogTarget` / `ConnectionParams` describing a backend under test
//! - `ConnectionProvider` / `SqlConnection` traits consumed by workers
//! - `TrinoProvider` speaking the query engine's HTTP statement protocol

mod connection;
mod trino;
mod types;

pub use connection::{ConnectionProvider, SqlConnection};
pub use trino::{TrinoConnection, TrinoProvider, quote_identifier};
pub use types::{CatalogTarget, ConnectionParams, QueryResult};
