//! In-memory lock backend.
//!
//! Implements the full session semantics against a process-local table:
//! per-session exclusive/shared stack counts, self-compatibility, and
//! release-everything-on-close. Useful as a drop-in test double and for
//! callers that only need coordination inside one process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

use crate::backend::{LockBackend, LockKey, LockMode, SessionSource};
use crate::error::{LockError, LockResult};
use crate::timeout::{Timeout, TimeoutValue};

type SessionId = u64;

/// Hold state for one key: who stacks exclusive, who stacks shared.
#[derive(Default)]
struct KeyState {
    exclusive_owner: Option<SessionId>,
    exclusive_count: u64,
    shared: HashMap<SessionId, u64>,
}

impl KeyState {
    fn is_idle(&self) -> bool {
        self.exclusive_count == 0 && self.shared.is_empty()
    }

    /// A request never conflicts with counts held by the same session.
    fn grantable(&self, session: SessionId, mode: LockMode) -> bool {
        let exclusive_ok = match self.exclusive_owner {
            Some(owner) => owner == session,
            None => true,
        };
        match mode {
            LockMode::Exclusive => {
                exclusive_ok && self.shared.keys().all(|holder| *holder == session)
            }
            LockMode::Shared => exclusive_ok,
        }
    }

    fn grant(&mut self, session: SessionId, mode: LockMode) {
        match mode {
            LockMode::Exclusive => {
                self.exclusive_owner = Some(session);
                self.exclusive_count += 1;
            }
            LockMode::Shared => {
                *self.shared.entry(session).or_insert(0) += 1;
            }
        }
    }

    /// Decrements one count. Releasing a count the session does not hold is
    /// a silent no-op, mirroring server-side unlock behavior.
    fn release(&mut self, session: SessionId, mode: LockMode) {
        match mode {
            LockMode::Exclusive => {
                if self.exclusive_owner == Some(session) {
                    self.exclusive_count -= 1;
                    if self.exclusive_count == 0 {
                        self.exclusive_owner = None;
                    }
                }
            }
            LockMode::Shared => {
                if let Some(count) = self.shared.get_mut(&session) {
                    *count -= 1;
                    if *count == 0 {
                        self.shared.remove(&session);
                    }
                }
            }
        }
    }

    fn drop_session(&mut self, session: SessionId) {
        if self.exclusive_owner == Some(session) {
            self.exclusive_owner = None;
            self.exclusive_count = 0;
        }
        self.shared.remove(&session);
    }
}

struct TableInner {
    keys: Mutex<HashMap<LockKey, KeyState>>,
    /// Pinged whenever counts drop, waking blocked waiters for a re-check.
    released: Notify,
    next_session: AtomicU64,
}

/// Shared lock table backing [`MemorySessionSource`] sessions.
///
/// Cloning is cheap and every clone sees the same table; sessions opened
/// from sources over the same table contend with each other.
#[derive(Clone)]
pub struct MemoryLockTable {
    inner: Arc<TableInner>,
}

impl MemoryLockTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TableInner {
                keys: Mutex::new(HashMap::new()),
                released: Notify::new(),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    fn try_acquire(&self, session: SessionId, key: LockKey, mode: LockMode) -> bool {
        let mut keys = self.inner.keys.lock().unwrap();
        let state = keys.entry(key).or_default();
        if state.grantable(session, mode) {
            state.grant(session, mode);
            true
        } else {
            false
        }
    }

    fn release(&self, session: SessionId, key: LockKey, mode: LockMode) {
        {
            let mut keys = self.inner.keys.lock().unwrap();
            if let Some(state) = keys.get_mut(&key) {
                state.release(session, mode);
                if state.is_idle() {
                    keys.remove(&key);
                }
            }
        }
        self.inner.released.notify_waiters();
    }

    fn drop_session(&self, session: SessionId) {
        {
            let mut keys = self.inner.keys.lock().unwrap();
            keys.retain(|_, state| {
                state.drop_session(session);
                !state.is_idle()
            });
        }
        self.inner.released.notify_waiters();
    }
}

impl Default for MemoryLockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of sessions over one [`MemoryLockTable`], bounded at `capacity`
/// concurrently open sessions.
pub struct MemorySessionSource {
    table: MemoryLockTable,
    permits: Arc<Semaphore>,
}

impl MemorySessionSource {
    pub fn new(table: MemoryLockTable, capacity: usize) -> Self {
        Self {
            table,
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }
}

impl SessionSource for MemorySessionSource {
    type Backend = MemoryLockSession;

    async fn open_session(&self, timeout: Timeout) -> LockResult<MemoryLockSession> {
        let acquire = self.permits.clone().acquire_owned();
        let permit = match TimeoutValue::from(timeout).as_duration() {
            None => acquire.await,
            Some(limit) => match tokio::time::timeout(limit, acquire).await {
                Ok(result) => result,
                Err(_) => return Err(LockError::Unavailable),
            },
        }
        .map_err(|_| LockError::Unavailable)?;

        let id = self.table.inner.next_session.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryLockSession {
            table: self.table.clone(),
            id,
            open: true,
            _permit: permit,
        })
    }
}

/// One in-memory session. Dropping it releases every count it holds and
/// frees its source slot, same as a closed connection would.
pub struct MemoryLockSession {
    table: MemoryLockTable,
    id: SessionId,
    open: bool,
    _permit: OwnedSemaphorePermit,
}

impl MemoryLockSession {
    async fn wait_acquire(&mut self, key: LockKey, mode: LockMode, timeout: Timeout) -> LockResult<()> {
        let timeout_value = TimeoutValue::from(timeout);
        let start = Instant::now();

        loop {
            // Register for wakeups before checking, so a release landing
            // between the check and the await is not missed. `enable` is
            // what registers; an unpolled `notified()` future would not
            // see `notify_waiters`.
            let mut released = std::pin::pin!(self.table.inner.released.notified());
            released.as_mut().enable();
            if self.table.try_acquire(self.id, key, mode) {
                return Ok(());
            }
            match timeout_value.as_duration() {
                None => released.await,
                Some(limit) => {
                    let elapsed = start.elapsed();
                    if elapsed >= limit {
                        return Err(LockError::Timeout(limit));
                    }
                    // A timeout here falls through to one final check above.
                    let _ = tokio::time::timeout(limit - elapsed, released).await;
                }
            }
        }
    }

    fn end(&mut self) {
        if self.open {
            self.open = false;
            self.table.drop_session(self.id);
        }
    }
}

impl LockBackend for MemoryLockSession {
    async fn try_exclusive(&mut self, key: LockKey) -> LockResult<bool> {
        Ok(self.table.try_acquire(self.id, key, LockMode::Exclusive))
    }

    async fn try_shared(&mut self, key: LockKey) -> LockResult<bool> {
        Ok(self.table.try_acquire(self.id, key, LockMode::Shared))
    }

    async fn wait_exclusive(&mut self, key: LockKey, timeout: Timeout) -> LockResult<()> {
        self.wait_acquire(key, LockMode::Exclusive, timeout).await
    }

    async fn wait_shared(&mut self, key: LockKey, timeout: Timeout) -> LockResult<()> {
        self.wait_acquire(key, LockMode::Shared, timeout).await
    }

    async fn release_exclusive(&mut self, key: LockKey) -> LockResult<()> {
        self.table.release(self.id, key, LockMode::Exclusive);
        Ok(())
    }

    async fn release_shared(&mut self, key: LockKey) -> LockResult<()> {
        self.table.release(self.id, key, LockMode::Shared);
        Ok(())
    }

    async fn close(mut self) -> LockResult<()> {
        self.end();
        Ok(())
    }
}

impl Drop for MemoryLockSession {
    fn drop(&mut self) {
        self.end();
    }
}
