//! Session storage in the OS credential manager
//!
//! Stores session values as keyring entries (Windows Credential Manager,
//! macOS Keychain, Linux Secret Service) under a per-application service
//! name. Values are tied to the current OS user account.

use keyring::Entry;

use super::{Storage, StorageError};

/// Keyring-backed storage for session values
///
/// # Example
///
/// ```no_run
/// use doca_session::storage::{KeyringStorage, Storage};
///
/// let storage = KeyringStorage::new();
/// storage.set("token", "abc123").unwrap();
/// assert_eq!(storage.get("token").unwrap(), Some("abc123".to_string()));
/// storage.remove("token").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    /// Creates a store under the default service name
    pub fn new() -> Self {
        Self::with_service("Doca")
    }

    /// Creates a store under a custom service name
    ///
    /// Useful for tests or for keeping several storefront profiles apart.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Returns the service name used for this store
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keyring(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keyring(e)),
        }
    }
}
