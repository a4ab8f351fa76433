//! PostgreSQL backend for session-scoped advisory locks.
//!
//! Advisory locks are application-defined locks that suit strategies which
//! fit the MVCC model awkwardly. They are faster than table-based locking,
//! avoid table bloat, and are cleaned up by the server at the end of the
//! session. This crate uses session-level locks exclusively; see
//! [`PostgresLockSession`] for the transaction-semantics caveat.

pub mod session;
pub mod source;

pub use session::PostgresLockSession;
pub use source::{PostgresConnection, PostgresSessionSource};
