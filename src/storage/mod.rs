//! Storage module - Persistent key-value backends for session state
//!
//! Every backend implements the [`Storage`] trait so the auth cache can be
//! pointed at:
//! - An in-memory map (tests, headless embedders)
//! - A SQLite file (durable, shareable between processes)
//! - The OS credential manager (via the keyring crate)
//! - Nothing at all ([`UnavailableStorage`], the server-side rendering case)

mod keyring_store;
mod memory;
mod sqlite;

pub use keyring_store::KeyringStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// No storage runtime exists in this context
    #[error("Storage is not available in this runtime")]
    Unavailable,

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Keyring operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// A backend lock was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// A string key-value store shared by every session instance of an origin
///
/// Writes are global side effects: any other handle on the same backing
/// store observes them on its next read.
#[cfg_attr(test, mockall::automock)]
pub trait Storage: Send + Sync {
    /// Reads a value, `None` when the key is not set
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Returns false when there is no storage runtime at all
    fn is_available(&self) -> bool {
        true
    }
}

/// Notification that another instance changed the shared store
///
/// `key == None` means the whole store was cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
}

impl StorageEvent {
    /// Creates an event for a single key
    pub fn changed(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: Some(key.into()),
            new_value,
        }
    }

    /// Creates an event for a full clear of the store
    pub fn cleared() -> Self {
        Self {
            key: None,
            new_value: None,
        }
    }
}

/// Storage for contexts without a storage runtime
///
/// Every call fails with [`StorageError::Unavailable`]; readers are expected
/// to degrade to "empty" instead of surfacing the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}
