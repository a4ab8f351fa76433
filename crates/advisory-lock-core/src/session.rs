//! Lock session façade.

use std::fmt;

use tracing::debug;

use crate::backend::{LockBackend, LockKey, SessionSource};
use crate::error::{LockError, LockResult};
use crate::timeout::Timeout;

/// A numeric-keyed advisory lock bound to one dedicated backend session.
///
/// A `LockSession` is created once via [`bind`](Self::bind), accumulates
/// acquire/release calls during its working lifetime, and is destroyed by an
/// explicit [`close`](Self::close). The backend session is owned exclusively
/// by this value for its entire lifetime; it is never shared with another
/// `LockSession` or handed back to the source before close. That costs one
/// source slot per outstanding lock, which is the deliberate trade-off that
/// makes "releasing the lock" and "ending the session" the same operation.
///
/// Lock requests stack: a key acquired three times must be released three
/// times, except that `close` releases everything at once. The counts
/// themselves live in the backend; this type never caches or predicts them,
/// so every operation is a round trip.
///
/// Operations take `&mut self`: one backend session serves one request at a
/// time, and the exclusive borrow enforces that without any internal
/// locking.
pub struct LockSession<B: LockBackend> {
    key: LockKey,
    backend: Option<B>,
}

impl<B: LockBackend> LockSession<B> {
    /// Binds a new session for `key`, drawing one dedicated backend session
    /// from `source`.
    ///
    /// Waits up to `timeout` for the source to supply a session and fails
    /// with [`LockError::Unavailable`] when it cannot; connectivity errors
    /// from the source propagate unchanged.
    pub async fn bind<S>(source: &S, key: LockKey, timeout: Timeout) -> LockResult<Self>
    where
        S: SessionSource<Backend = B>,
    {
        let backend = source.open_session(timeout).await?;
        debug!(lock.key = key, "lock session bound");
        Ok(Self {
            key,
            backend: Some(backend),
        })
    }

    /// Returns the key this session locks.
    pub fn key(&self) -> LockKey {
        self.key
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    fn backend(&mut self) -> LockResult<&mut B> {
        self.backend.as_mut().ok_or(LockError::SessionClosed)
    }

    /// Attempts to take one exclusive count without waiting.
    ///
    /// Returns `Ok(false)` when another session holds any count on the key;
    /// this is contention, not an error. A session that already holds the
    /// key always succeeds.
    pub async fn try_exclusive(&mut self) -> LockResult<bool> {
        let key = self.key;
        self.backend()?.try_exclusive(key).await
    }

    /// Attempts to take one shared count without waiting.
    ///
    /// Returns `Ok(false)` only when another session holds exclusive;
    /// shared holders on other sessions do not conflict.
    pub async fn try_shared(&mut self) -> LockResult<bool> {
        let key = self.key;
        self.backend()?.try_shared(key).await
    }

    /// Takes one exclusive count, waiting until no other session holds any
    /// count on the key or `timeout` elapses.
    ///
    /// On [`LockError::Timeout`] the session holds nothing. No wake-order
    /// guarantee is made among waiting sessions.
    pub async fn wait_exclusive(&mut self, timeout: Timeout) -> LockResult<()> {
        let key = self.key;
        self.backend()?.wait_exclusive(key, timeout).await
    }

    /// Takes one shared count, waiting until no other session holds
    /// exclusive or `timeout` elapses. Same deadline contract as
    /// [`wait_exclusive`](Self::wait_exclusive).
    pub async fn wait_shared(&mut self, timeout: Timeout) -> LockResult<()> {
        let key = self.key;
        self.backend()?.wait_shared(key, timeout).await
    }

    /// Releases one exclusive count.
    ///
    /// Releasing a count that is already zero is a silent no-op at the
    /// protocol level. Pairing one release per acquire is the caller's
    /// responsibility; the no-op must not be read as confirmation that a
    /// matching acquire ever happened.
    pub async fn release_exclusive(&mut self) -> LockResult<()> {
        let key = self.key;
        self.backend()?.release_exclusive(key).await
    }

    /// Releases one shared count, with the same no-op-on-underflow behavior
    /// as [`release_exclusive`](Self::release_exclusive).
    pub async fn release_shared(&mut self) -> LockResult<()> {
        let key = self.key;
        self.backend()?.release_shared(key).await
    }

    /// Terminates the backend session, releasing every exclusive and shared
    /// count as an atomic consequence of session termination.
    ///
    /// This is the only operation guaranteed to fully release the key
    /// regardless of how many acquire/release calls were balanced, and it is
    /// safe to call after earlier operations failed. Every subsequent
    /// operation, including a second close, fails with
    /// [`LockError::SessionClosed`].
    ///
    /// Dropping an unclosed `LockSession` also terminates the backend
    /// session, but without surfacing errors; prefer an explicit close.
    pub async fn close(&mut self) -> LockResult<()> {
        match self.backend.take() {
            Some(backend) => {
                debug!(lock.key = self.key, "lock session closed");
                backend.close().await
            }
            None => Err(LockError::SessionClosed),
        }
    }
}

// Manual impl: the backend need not be Debug, and its contents are opaque
// remote state anyway.
impl<B: LockBackend> fmt::Debug for LockSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSession")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
