//! PostgreSQL advisory lock session.

use std::time::{Duration, Instant};

use advisory_lock_core::backend::{LockBackend, LockKey, LockMode};
use advisory_lock_core::error::{LockError, LockResult};
use advisory_lock_core::timeout::{Timeout, TimeoutValue};
use deadpool_postgres::Object;
use tracing::{instrument, Span};

/// One dedicated PostgreSQL connection holding session-level advisory locks.
///
/// Session-level advisory locks persist until explicitly released or the
/// session ends, and they do not honor transaction semantics: a lock taken
/// during a transaction that later rolls back is still held after the
/// rollback. The server tracks the exclusive and shared stack counts per
/// (connection, key); closing the connection releases them all.
pub struct PostgresLockSession {
    conn: Option<Object>,
}

const TRY_EXCLUSIVE_SQL: &str = "SELECT pg_try_advisory_lock($1)";
const TRY_SHARED_SQL: &str = "SELECT pg_try_advisory_lock_shared($1)";
const RELEASE_EXCLUSIVE_SQL: &str = "SELECT pg_advisory_unlock($1)";
const RELEASE_SHARED_SQL: &str = "SELECT pg_advisory_unlock_shared($1)";

fn backend_error(err: tokio_postgres::Error) -> LockError {
    LockError::Backend(Box::new(err))
}

impl PostgresLockSession {
    pub(crate) fn new(conn: Object) -> Self {
        Self { conn: Some(conn) }
    }

    fn conn(&self) -> LockResult<&Object> {
        self.conn.as_ref().ok_or(LockError::SessionClosed)
    }

    async fn try_acquire(&mut self, key: LockKey, mode: LockMode) -> LockResult<bool> {
        let sql = match mode {
            LockMode::Exclusive => TRY_EXCLUSIVE_SQL,
            LockMode::Shared => TRY_SHARED_SQL,
        };
        let row = self
            .conn()?
            .query_one(sql, &[&key])
            .await
            .map_err(backend_error)?;
        Ok(row.get(0))
    }

    /// Polls the non-blocking server function with capped exponential
    /// backoff instead of issuing a server-side blocking call. Every round
    /// trip runs to completion, so deadline expiry between rounds leaves no
    /// lock held, and a grant that lands as the deadline passes is observed
    /// and reported as acquired. Wake order among waiters is whatever the
    /// polling happens to produce.
    async fn wait_acquire(&mut self, key: LockKey, mode: LockMode, timeout: Timeout) -> LockResult<()> {
        let timeout_value = TimeoutValue::from(timeout);
        let start = Instant::now();

        let mut pause = Duration::from_millis(50);
        const MAX_PAUSE: Duration = Duration::from_secs(1);

        loop {
            if self.try_acquire(key, mode).await? {
                Span::current().record("elapsed_ms", start.elapsed().as_millis() as u64);
                return Ok(());
            }
            match timeout_value.as_duration() {
                None => tokio::time::sleep(pause).await,
                Some(limit) => {
                    let elapsed = start.elapsed();
                    if elapsed >= limit {
                        return Err(LockError::Timeout(limit));
                    }
                    tokio::time::sleep(pause.min(limit - elapsed)).await;
                }
            }
            pause = (pause * 2).min(MAX_PAUSE);
        }
    }

    async fn release(&mut self, key: LockKey, mode: LockMode) -> LockResult<()> {
        let sql = match mode {
            LockMode::Exclusive => RELEASE_EXCLUSIVE_SQL,
            LockMode::Shared => RELEASE_SHARED_SQL,
        };
        // The unlock functions return false when no matching count is held;
        // the server treats that as a no-op and so do we.
        self.conn()?
            .query_one(sql, &[&key])
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    /// Detaches the connection from the pool so dropping it really closes
    /// the server session instead of recycling the connection.
    fn detach(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(Object::take(conn));
        }
    }
}

impl LockBackend for PostgresLockSession {
    #[instrument(
        skip(self),
        fields(backend = "postgres", acquired = tracing::field::Empty)
    )]
    async fn try_exclusive(&mut self, key: LockKey) -> LockResult<bool> {
        let acquired = self.try_acquire(key, LockMode::Exclusive).await?;
        Span::current().record("acquired", acquired);
        Ok(acquired)
    }

    #[instrument(
        skip(self),
        fields(backend = "postgres", acquired = tracing::field::Empty)
    )]
    async fn try_shared(&mut self, key: LockKey) -> LockResult<bool> {
        let acquired = self.try_acquire(key, LockMode::Shared).await?;
        Span::current().record("acquired", acquired);
        Ok(acquired)
    }

    #[instrument(
        skip(self),
        fields(backend = "postgres", elapsed_ms = tracing::field::Empty)
    )]
    async fn wait_exclusive(&mut self, key: LockKey, timeout: Timeout) -> LockResult<()> {
        self.wait_acquire(key, LockMode::Exclusive, timeout).await
    }

    #[instrument(
        skip(self),
        fields(backend = "postgres", elapsed_ms = tracing::field::Empty)
    )]
    async fn wait_shared(&mut self, key: LockKey, timeout: Timeout) -> LockResult<()> {
        self.wait_acquire(key, LockMode::Shared, timeout).await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn release_exclusive(&mut self, key: LockKey) -> LockResult<()> {
        self.release(key, LockMode::Exclusive).await
    }

    #[instrument(skip(self), fields(backend = "postgres"))]
    async fn release_shared(&mut self, key: LockKey) -> LockResult<()> {
        self.release(key, LockMode::Shared).await
    }

    async fn close(mut self) -> LockResult<()> {
        self.detach();
        Ok(())
    }
}

impl Drop for PostgresLockSession {
    fn drop(&mut self) {
        self.detach();
    }
}
