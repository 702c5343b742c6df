//! PostgreSQL engine and the transactional command context built on it

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::domain::{AsyncCommandContext, AsyncContextFactory, BoxError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is already closed")]
    Closed,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Pooled PostgreSQL access; hands out one transaction per command.
#[derive(Debug, Clone)]
pub struct PostgresEngine {
    pool: PgPool,
}

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new().max_connections(config.pool_size)
}

impl PostgresEngine {
    /// Open the pool and make sure the database answers.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(config)
            .connect_with(connect_options(config))
            .await?;
        info!(
            host = %config.host,
            database = %config.database,
            "Connected to database"
        );
        Ok(Self { pool })
    }

    /// Build the pool without opening any connection yet.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        Self {
            pool: pool_options(config).connect_lazy_with(connect_options(config)),
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start a transaction wrapped in a command context.
    pub async fn create_session(&self) -> Result<SqlCommandContext, SessionError> {
        let transaction = self.pool.begin().await?;
        Ok(SqlCommandContext {
            transaction: Some(transaction),
        })
    }
}

#[async_trait]
impl AsyncContextFactory for PostgresEngine {
    type Context = SqlCommandContext;

    async fn create_context(&self) -> Result<SqlCommandContext, BoxError> {
        Ok(self.create_session().await?)
    }
}

/// One transaction per command call. Commit and rollback both close it.
pub struct SqlCommandContext {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl SqlCommandContext {
    /// Connection inside the open transaction
    pub fn connection(&mut self) -> Result<&mut PgConnection, SessionError> {
        match self.transaction.as_mut() {
            Some(transaction) => Ok(&mut **transaction),
            None => Err(SessionError::Closed),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transaction.is_some()
    }
}

#[async_trait]
impl AsyncCommandContext for SqlCommandContext {
    type Error = SessionError;

    async fn commit(&mut self) -> Result<(), SessionError> {
        let transaction = self.transaction.take().ok_or(SessionError::Closed)?;
        transaction.commit().await?;
        Ok(())
    }

    /// Rolling back a closed session does nothing.
    async fn rollback(&mut self) -> Result<(), SessionError> {
        match self.transaction.take() {
            Some(transaction) => Ok(transaction.rollback().await?),
            None => Ok(()),
        }
    }
}
