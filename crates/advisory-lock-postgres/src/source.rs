//! Connection pool management for PostgreSQL lock sessions.

use std::str::FromStr;

use advisory_lock_core::backend::SessionSource;
use advisory_lock_core::error::{LockError, LockResult};
use advisory_lock_core::timeout::{Timeout, TimeoutValue};
use deadpool_postgres::{Config, Pool, PoolError, Runtime};
use tokio_postgres::NoTls;

use crate::session::PostgresLockSession;

/// PostgreSQL connection source configuration.
#[derive(Debug, Clone)]
pub enum PostgresConnection {
    /// Connection string - library manages pooling.
    ConnectionString(String),
    /// External connection pool.
    Pool(Pool),
}

impl PostgresConnection {
    /// Creates a connection pool from a connection string.
    pub async fn create_pool(connection_string: &str) -> LockResult<Pool> {
        let tokio_config = tokio_postgres::Config::from_str(connection_string).map_err(|e| {
            LockError::Connection(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid connection string: {}", e),
            )))
        })?;

        let mut pg_config = Config::new();
        if let Some(user) = tokio_config.get_user() {
            pg_config.user = Some(user.to_string());
        }
        if let Some(password) = tokio_config.get_password() {
            pg_config.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(dbname) = tokio_config.get_dbname() {
            pg_config.dbname = Some(dbname.to_string());
        }
        if let Some(host) = tokio_config.get_hosts().first() {
            if let tokio_postgres::config::Host::Tcp(host_str) = host {
                pg_config.host = Some(host_str.clone());
            }
        }
        if let Some(port) = tokio_config.get_ports().first() {
            pg_config.port = Some(*port);
        } else {
            pg_config.port = Some(5432);
        }

        pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| LockError::Connection(Box::new(e)))
    }

    /// Gets or creates a connection pool.
    pub async fn get_pool(&self) -> LockResult<Pool> {
        match self {
            Self::ConnectionString(conn_str) => Self::create_pool(conn_str).await,
            Self::Pool(pool) => Ok(pool.clone()),
        }
    }
}

/// Source of dedicated PostgreSQL sessions.
///
/// Every open session consumes one pool slot for its entire lifetime, so the
/// pool must be sized at one connection per concurrently held lock. When a
/// session ends its connection is detached from the pool and closed rather
/// than recycled: a recycled connection would carry its session-level
/// advisory locks to the next borrower.
pub struct PostgresSessionSource {
    pool: Pool,
}

impl PostgresSessionSource {
    /// Creates a source from a connection configuration.
    pub async fn new(connection: PostgresConnection) -> LockResult<Self> {
        Ok(Self {
            pool: connection.get_pool().await?,
        })
    }

    /// Creates a source from a connection string.
    pub async fn connect(connection_string: impl Into<String>) -> LockResult<Self> {
        Self::new(PostgresConnection::ConnectionString(connection_string.into())).await
    }

    /// Creates a source over an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }
}

impl SessionSource for PostgresSessionSource {
    type Backend = PostgresLockSession;

    async fn open_session(&self, timeout: Timeout) -> LockResult<PostgresLockSession> {
        let conn = match TimeoutValue::from(timeout).as_duration() {
            None => self.pool.get().await,
            Some(limit) => match tokio::time::timeout(limit, self.pool.get()).await {
                Ok(result) => result,
                Err(_) => return Err(LockError::Unavailable),
            },
        }
        .map_err(|e| match e {
            // Pool exhaustion is distinct from connectivity failures: the
            // former clears up when some session closes, the latter does not.
            PoolError::Timeout(_) => LockError::Unavailable,
            other => LockError::Connection(Box::new(other)),
        })?;

        Ok(PostgresLockSession::new(conn))
    }
}
