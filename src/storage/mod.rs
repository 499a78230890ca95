//! Client-local persistent storage.
//!
//! The rest of the crate only sees the [`KeyValueStore`] trait: a tiny,
//! synchronous string map, the same shape as a browser's local storage.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  SessionStore / Identity     │
//! └──────────────┬───────────────┘
//!                │
//!                ▼
//! ┌──────────────────────────────┐
//! │     KeyValueStore trait      │
//! └──────────────┬───────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ MemoryStore │  │  FileStore  │
//! └─────────────┘  └─────────────┘
//! ```

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;

/// Synchronous string key/value persistence.
///
/// Implementations must be thread-safe; a single store is shared by the
/// request pipeline, the session identity provider and the auth session.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
