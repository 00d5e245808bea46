//! Database abstraction layer for db-runner.
//!
//! Provides a trait-based interface over a single owned connection, allowing
//! different database backends to be used interchangeably by the runner.

mod postgres;
mod sqlite;
mod types;

pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, FetchMode, QueryResult, Record, Row, RowSet, Value};

use crate::config::ConnectionProfile;
use crate::error::Result;
use crate::query::BoundValue;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend (0 for file-based backends).
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Sqlite => 0,
        }
    }

    /// Formats the positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => format!("?{index}"),
        }
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Row id of the last inserted row, where the backend reports one.
    pub last_insert_id: Option<i64>,
}

/// Opens a database client for the given profile.
///
/// This is the central factory function for database connections.
pub async fn connect(profile: &ConnectionProfile) -> Result<Box<dyn DatabaseClient>> {
    match profile.backend {
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(profile).await?;
            Ok(Box::new(client))
        }
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(profile).await?;
            Ok(Box::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// `sql` is already rewritten to the backend's positional placeholder syntax and
/// `params` holds one value per placeholder index, in order.
#[async_trait]
pub trait DatabaseClient: Send {
    /// The backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Prepares and executes a row-returning statement.
    async fn fetch_rows(&mut self, sql: &str, params: &[BoundValue]) -> Result<RowSet>;

    /// Prepares and executes a statement, returning its affected-row count.
    async fn execute(&mut self, sql: &str, params: &[BoundValue]) -> Result<ExecOutcome>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}
