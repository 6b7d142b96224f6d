//! Gate query layer: guard, statement templates and the MySQL pool.
//!
//! Request handlers never build SQL by hand. Names coming from a request
//! pass through [`guard`] into [`statement`] templates; the resulting
//! [`Statement`] is run by a [`SqlExecutor`], which for production is the
//! pooled [`Database`] below.

pub mod catalog;
pub mod executor;
pub mod guard;
pub mod rows;
pub mod statement;

use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    MySqlPool,
};
use tracing::debug;

pub use catalog::{count_from_rows, ColumnDescriptor};
pub use executor::{ExecutionError, SqlExecutor};
pub use guard::{GuardError, Identifier, Page, ReadOnlyQuery, TableRef};
pub use rows::{first_column_strings, JsonRow};
pub use statement::{Param, Statement};

pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters for the upstream server.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Default schema for the session. Unqualified table names resolve here.
    pub database: Option<String>,
    pub pool_size: u32,
    /// Bounds both a single statement and the wait for a free connection.
    pub statement_timeout: Duration,
}

/// Pooled connection handle shared by all requests.
#[derive(Clone, Debug)]
pub struct Database {
    pool: MySqlPool,
    statement_timeout: Duration,
}

impl Database {
    /// Builds the pool and opens a first connection so that bad credentials
    /// or an unreachable host fail at startup.
    pub async fn connect(settings: &ConnectSettings) -> Result<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password);
        if let Some(database) = &settings.database {
            options = options.database(database);
        }
        Self::connect_with(options, settings.pool_size, settings.statement_timeout).await
    }

    /// Connects from a `mysql://` URL.
    pub async fn connect_url(
        database_url: &str,
        pool_size: u32,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let options = MySqlConnectOptions::from_str(database_url)
            .context("invalid MySQL connection URL")?;
        Self::connect_with(options, pool_size, statement_timeout).await
    }

    async fn connect_with(
        options: MySqlConnectOptions,
        pool_size: u32,
        statement_timeout: Duration,
    ) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size.max(1))
            .acquire_timeout(statement_timeout)
            .connect_with(options)
            .await
            .context("failed to open MySQL connection pool")?;

        Ok(Self {
            pool,
            statement_timeout,
        })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Waits for checked-out connections to come back, then closes them.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run(&self, statement: &Statement) -> Result<Vec<JsonRow>, ExecutionError> {
        debug!(sql = statement.sql(), params = ?statement.params(), "executing statement");

        let mut query = sqlx::query(statement.sql()).persistent(statement.is_persistent());
        for param in statement.params() {
            query = match *param {
                Param::Unsigned(value) => query.bind(value),
            };
        }

        let mut stream = query.fetch(&self.pool);
        let mut out = Vec::new();
        while let Some(row) = stream.try_next().await? {
            out.push(rows::row_to_json(&row)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl SqlExecutor for Database {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<JsonRow>, ExecutionError> {
        tokio::time::timeout(self.statement_timeout, self.run(statement))
            .await
            .map_err(|_| ExecutionError::Timeout(self.statement_timeout))?
    }
}
