//! Error types for lock session operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock session operations.
///
/// A contended non-blocking attempt is not an error: `try_exclusive` and
/// `try_shared` report contention as `Ok(false)`. Errors are reserved for
/// infrastructure failures, deadlines, and misuse of a closed session, so
/// callers can always tell the three conditions apart.
#[derive(Error, Debug)]
pub enum LockError {
    /// No dedicated session could be obtained from the source before the
    /// deadline. Recoverable by retrying construction later.
    #[error("no session available from the connection source")]
    Unavailable,

    /// A blocking wait was aborted by its deadline before acquisition.
    /// The lock is guaranteed not held.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// A blocking wait was cancelled before acquisition.
    ///
    /// Reserved for backends with cooperative cancellation. The bundled
    /// backends never return it: they express cancellation by dropping the
    /// future and deadlines as [`Timeout`](Self::Timeout).
    #[error("lock operation was cancelled")]
    Cancelled,

    /// An operation was invoked after `close()`. Always a caller-logic
    /// error; the session must not be reused.
    #[error("lock session is closed")]
    SessionClosed,

    /// Backend connection failed (network, authentication). Surfaced
    /// verbatim, never retried internally.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A primitive round trip against the backend failed. Surfaced
    /// verbatim, never retried internally.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for lock session operations.
pub type LockResult<T> = Result<T, LockError>;
