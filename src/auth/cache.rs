//! In-memory mirror of the persisted session fields
//!
//! The cache is hydrated from storage once per instance and written through
//! afterwards. It is never a source of truth on its own: every write hits the
//! store first, so a failure between the two steps leaves the next hydration
//! consistent with the store.

use std::sync::Arc;

use super::session::{Session, SessionField, UserData};
use crate::security::SecureString;
use crate::storage::{Storage, StorageError};

/// Write-through cache of `token`, `refreshToken` and `userData`
pub struct AuthCache {
    storage: Arc<dyn Storage>,
    initialized: bool,
    token: Option<SecureString>,
    refresh_token: Option<SecureString>,
    user_data_raw: Option<String>,
    user_data: Option<UserData>,
}

impl AuthCache {
    /// Creates an empty, not yet hydrated cache over `storage`
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            initialized: false,
            token: None,
            refresh_token: None,
            user_data_raw: None,
            user_data: None,
        }
    }

    /// Returns true once the cache has been hydrated
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the backing store
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Hydrates the cache from storage; no-op after the first success
    ///
    /// Without a storage runtime this leaves the cache empty and returns
    /// without marking it initialized.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        if !self.storage.is_available() {
            tracing::debug!("Storage unavailable, auth cache stays empty");
            return;
        }
        self.load_from_storage();
        self.initialized = true;
    }

    /// Re-reads every field after another instance changed the store
    pub fn rehydrate(&mut self) {
        if !self.storage.is_available() {
            return;
        }
        self.load_from_storage();
        self.initialized = true;
    }

    fn load_from_storage(&mut self) {
        self.token = self.read_store(SessionField::Token).map(SecureString::new);
        self.refresh_token = self
            .read_store(SessionField::RefreshToken)
            .map(SecureString::new);
        self.set_user_data_raw(self.read_store(SessionField::UserData));
    }

    fn read_store(&self, field: SessionField) -> Option<String> {
        match self.storage.get(field.key()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read '{}' from storage: {}", field.key(), e);
                None
            }
        }
    }

    fn set_user_data_raw(&mut self, raw: Option<String>) {
        self.user_data = raw.as_deref().and_then(|json| {
            serde_json::from_str::<UserData>(json)
                .map_err(|e| tracing::warn!("Ignoring corrupt cached user data: {}", e))
                .ok()
        });
        self.user_data_raw = raw;
    }

    /// Returns the cached raw value of a field
    pub fn read(&mut self, field: SessionField) -> Option<String> {
        self.initialize();
        match field {
            SessionField::Token => self.token.as_ref().map(|t| t.expose()),
            SessionField::RefreshToken => self.refresh_token.as_ref().map(|t| t.expose()),
            SessionField::UserData => self.user_data_raw.clone(),
        }
    }

    /// Writes a field through to storage, then to memory
    ///
    /// `None` removes the field. On a storage error the in-memory value is
    /// left untouched.
    pub fn write(&mut self, field: SessionField, value: Option<&str>) -> Result<(), StorageError> {
        self.initialize();

        match value {
            Some(v) => self.storage.set(field.key(), v)?,
            None => self.storage.remove(field.key())?,
        }

        let owned = value.map(str::to_string);
        match field {
            SessionField::Token => self.token = owned.map(SecureString::new),
            SessionField::RefreshToken => self.refresh_token = owned.map(SecureString::new),
            SessionField::UserData => self.set_user_data_raw(owned),
        }
        Ok(())
    }

    /// Writes a whole session, replacing whatever was stored before
    ///
    /// If any field fails to persist, every field is cleared so the store
    /// never mixes the new token with a previous user's profile.
    pub fn write_session(&mut self, session: &Session) -> Result<(), StorageError> {
        let user_json = session
            .user_data
            .as_ref()
            .and_then(|user| serde_json::to_string(user).ok());

        if let Err(e) = self.write_fields(session, user_json.as_deref()) {
            if let Err(clear_err) = self.clear() {
                tracing::warn!("Partial session not fully rolled back: {}", clear_err);
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_fields(&mut self, session: &Session, user_json: Option<&str>) -> Result<(), StorageError> {
        self.write(SessionField::Token, Some(&session.token))?;
        self.write(SessionField::RefreshToken, session.refresh_token.as_deref())?;
        self.write(SessionField::UserData, user_json)
    }

    /// Removes every session field from storage and memory
    ///
    /// Each field is attempted even if an earlier removal fails; memory is
    /// always cleared. The first storage error is returned.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        let mut first_error = None;
        for field in SessionField::ALL {
            if let Err(e) = self.storage.remove(field.key()) {
                tracing::warn!("Failed to remove '{}' from storage: {}", field.key(), e);
                first_error.get_or_insert(e);
            }
        }

        self.token = None;
        self.refresh_token = None;
        self.user_data_raw = None;
        self.user_data = None;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns the cached bearer token, if any
    pub fn token(&mut self) -> Option<&str> {
        self.initialize();
        self.token.as_deref()
    }

    /// Returns the cached refresh token, if any
    pub fn refresh_token(&mut self) -> Option<&str> {
        self.initialize();
        self.refresh_token.as_deref()
    }

    /// Returns the cached profile; `None` when absent or corrupt
    pub fn user_data(&mut self) -> Option<&UserData> {
        self.initialize();
        self.user_data.as_ref()
    }
}
