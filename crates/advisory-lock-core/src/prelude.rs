//! Convenience prelude for lock session types.

pub use crate::backend::{LockBackend, LockKey, LockMode, SessionSource};
pub use crate::error::{LockError, LockResult};
pub use crate::session::LockSession;
pub use crate::timeout::Timeout;
