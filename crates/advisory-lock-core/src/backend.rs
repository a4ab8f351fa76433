//! Backend traits for lock sessions.

use std::future::Future;

use crate::error::LockResult;
use crate::timeout::Timeout;

/// Identifier for a lockable resource.
///
/// An opaque, caller-supplied 64-bit signed integer. Two keys name the same
/// logical resource iff they are equal. Callers derive keys deterministically
/// (for example by hashing a resource name into this space); no hashing or
/// namespacing happens here, so unrelated resources that collide on the same
/// key will contend with each other.
pub type LockKey = i64;

/// Flavor of an advisory lock request.
///
/// Selects which primitive pair a backend call uses. Exclusive conflicts
/// with every holder on other sessions; shared is compatible with other
/// shared holders and conflicts only with exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Exclusive,
    Shared,
}

// ============================================================================
// Lock Backend Trait
// ============================================================================

/// One stateful backend session holding advisory locks.
///
/// All six primitives operate against the same session. The backend keeps a
/// separate stack count per (session, key) for exclusive and for shared
/// holds: acquiring the same key N times requires N releases, and a session
/// that already holds a key never blocks on itself when acquiring it again.
/// Ending the session releases every count unconditionally.
///
/// Methods take `&mut self` because a session is single-request-at-a-time;
/// the exclusive borrow is how that policy is enforced.
pub trait LockBackend: Send {
    /// Attempts to take one exclusive count on `key` without waiting.
    ///
    /// Returns `Ok(false)` when another session holds any count on the key.
    fn try_exclusive(&mut self, key: LockKey) -> impl Future<Output = LockResult<bool>> + Send;

    /// Attempts to take one shared count on `key` without waiting.
    ///
    /// Returns `Ok(false)` only when another session holds exclusive.
    fn try_shared(&mut self, key: LockKey) -> impl Future<Output = LockResult<bool>> + Send;

    /// Blocks until one exclusive count on `key` is granted or `timeout`
    /// elapses ([`LockError::Timeout`]). On timeout the session holds
    /// nothing; a grant that lands as the deadline passes is still reported
    /// as acquired.
    ///
    /// [`LockError::Timeout`]: crate::error::LockError::Timeout
    fn wait_exclusive(
        &mut self,
        key: LockKey,
        timeout: Timeout,
    ) -> impl Future<Output = LockResult<()>> + Send;

    /// Blocking counterpart of [`try_shared`](Self::try_shared), with the
    /// same deadline contract as [`wait_exclusive`](Self::wait_exclusive).
    fn wait_shared(
        &mut self,
        key: LockKey,
        timeout: Timeout,
    ) -> impl Future<Output = LockResult<()>> + Send;

    /// Releases one exclusive count on `key`.
    ///
    /// Releasing a count that is already zero is a silent no-op at the
    /// protocol level, never an error.
    fn release_exclusive(&mut self, key: LockKey) -> impl Future<Output = LockResult<()>> + Send;

    /// Releases one shared count on `key`, with the same no-op-on-underflow
    /// behavior as [`release_exclusive`](Self::release_exclusive).
    fn release_shared(&mut self, key: LockKey) -> impl Future<Output = LockResult<()>> + Send;

    /// Ends the session, releasing every held count regardless of how many
    /// acquire/release calls were balanced.
    fn close(self) -> impl Future<Output = LockResult<()>> + Send;
}

// ============================================================================
// Session Source Trait
// ============================================================================

/// Source of dedicated backend sessions.
///
/// A source has bounded capacity: every open session consumes one slot for
/// its entire lifetime. Callers size sources at one session per concurrently
/// held lock.
pub trait SessionSource: Send + Sync {
    /// The session type handed out by this source.
    type Backend: LockBackend;

    /// Opens one dedicated session, waiting up to `timeout` for capacity.
    ///
    /// Fails with [`LockError::Unavailable`] when no session can be handed
    /// out before the deadline; the source's own connectivity errors (auth,
    /// network) propagate unchanged.
    ///
    /// [`LockError::Unavailable`]: crate::error::LockError::Unavailable
    fn open_session(&self, timeout: Timeout)
    -> impl Future<Output = LockResult<Self::Backend>> + Send;
}
