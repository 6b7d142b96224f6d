//! Execution seam between request handling and the connection pool.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{rows::JsonRow, statement::Statement};

/// Failures raised while a statement is in flight.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Error reported by the server, message kept verbatim.
    #[error("{0}")]
    Database(String),
    #[error(transparent)]
    Driver(sqlx::Error),
    #[error("statement did not complete within {} seconds", .0.as_secs())]
    Timeout(Duration),
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => ExecutionError::Database(db_err.message().to_string()),
            other => ExecutionError::Driver(other),
        }
    }
}

/// Runs one statement and returns every row as JSON.
///
/// Implementations own their connection checkout; each call acquires and
/// releases independently, so two calls never share a snapshot.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<JsonRow>, ExecutionError>;

    async fn ping(&self) -> Result<(), ExecutionError> {
        self.fetch_all(&Statement::ping()).await.map(|_| ())
    }
}
