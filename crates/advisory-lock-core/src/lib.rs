//! Session-scoped advisory locks over pluggable backends.
//!
//! A [`LockSession`](session::LockSession) binds one dedicated backend
//! session to a 64-bit lock key and exposes try/wait acquisition in
//! exclusive or shared mode, stacked releases, and a close that releases
//! everything the session still holds. The locking itself is delegated to a
//! [`LockBackend`](backend::LockBackend); this crate ships an in-memory one,
//! and `advisory-lock-postgres` provides the PostgreSQL implementation.

pub mod backend;
pub mod error;
pub mod memory;
pub mod prelude;
pub mod session;
pub mod timeout;

pub use error::{LockError, LockResult};
pub use prelude::*;
