//! Auth service - the single authority for session transitions
//!
//! `Unauthenticated -> [login] -> Authenticated -> [refresh] -> Authenticated
//! (token rotated) -> [refresh failure | logout] -> Unauthenticated`.
//!
//! Navigation is never performed here: `logout` returns the [`Redirect`] the
//! UI layer has to follow.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tokio::sync::RwLock;

use super::cache::AuthCache;
use super::cookies::CookieMirror;
use super::error::AuthError;
use super::session::{
    LoginResponse, RefreshResponse, Redirect, SessionField, UserData, AUTH_LAST_UPDATED_KEY,
};
use crate::config::AppConfig;
use crate::security::Sanitizer;
use crate::storage::{Storage, StorageEvent};

/// Path of the remote login endpoint
pub const LOGIN_PATH: &str = "/api/v1/login";

/// How a token refresh attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token is cached
    Refreshed,
    /// Nothing was attempted and the session is untouched
    NoRefreshToken,
    /// The refresh failed and the session has been cleared
    LoggedOut,
}

/// Session manager over an injectable storage backend
pub struct AuthService {
    client: Client,
    base_url: String,
    refresh_path: Option<String>,
    login_redirect: String,
    cache: RwLock<AuthCache>,
    cookies: CookieMirror,
}

impl AuthService {
    /// Creates a service for `config` persisting into `storage`
    pub fn new(config: &AppConfig, storage: Arc<dyn Storage>) -> Result<Self, AuthError> {
        let cookies = CookieMirror::new(&config.api_base_url, config.cookie_max_age_days)?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_provider(cookies.jar())
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            refresh_path: config.refresh_path.clone(),
            login_redirect: config.login_path.clone(),
            cache: RwLock::new(AuthCache::new(storage)),
            cookies,
        })
    }

    /// Returns the HTTP client carrying the session cookie jar
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Returns the API base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the session cookie mirror
    pub fn cookies(&self) -> &CookieMirror {
        &self.cookies
    }

    /// Returns false when there is no storage runtime (server-side rendering)
    pub async fn is_available(&self) -> bool {
        self.cache.read().await.storage().is_available()
    }

    /// Hydrates the cache from storage; later calls are no-ops
    pub async fn initialize(&self) {
        self.cache.write().await.initialize();
    }

    /// Logs in with a username, email or phone number and a password
    ///
    /// On success the session is persisted, mirrored into cookies and the full
    /// server response is returned. A rejected login writes nothing; a login
    /// whose session cannot be persisted leaves no session at all.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let kind = Sanitizer::classify_identifier(identifier)?;
        Sanitizer::validate_password(password)?;

        let redacted = Sanitizer::sanitize_identifier(identifier);
        tracing::info!("Logging in as {} ({:?})", redacted, kind);

        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "usernameOrPhoneNumber": identifier.trim(),
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Login request for {} failed: {}", redacted, e);
                AuthError::transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::transport)?;

        if !status.is_success() {
            let err = AuthError::from_response_body(status, &body);
            tracing::warn!("Login rejected for {}: {} - {}", redacted, status, err);
            return Err(err);
        }

        let data: LoginResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse login response: {}", e);
            AuthError::MissingToken
        })?;

        let Some(session) = data.session() else {
            tracing::error!("Login response for {} did not include a token", redacted);
            return Err(AuthError::MissingToken);
        };

        let written = self.cache.write().await.write_session(&session);
        if let Err(e) = written {
            tracing::error!("Failed to persist session for {}: {}", redacted, e);
            self.cookies.clear_session();
            self.touch_marker().await;
            return Err(e.into());
        }
        self.cookies.mirror_session(&session);
        self.touch_marker().await;

        tracing::info!(
            "Logged in as {} (token {})",
            redacted,
            Sanitizer::sanitize_token(&session.token)
        );
        Ok(data)
    }

    /// Clears the session everywhere and returns the login redirect
    ///
    /// Never fails: storage errors are logged and the in-memory session is
    /// cleared regardless.
    pub async fn logout(&self) -> Redirect {
        if let Err(e) = self.cache.write().await.clear() {
            tracing::warn!("Session storage not fully cleared: {}", e);
        }
        self.cookies.clear_session();
        self.touch_marker().await;

        tracing::info!("Logged out");
        self.login_redirect()
    }

    /// True iff a non-empty token is cached
    pub async fn is_authenticated(&self) -> bool {
        self.cache
            .write()
            .await
            .token()
            .map_or(false, |t| !t.is_empty())
    }

    /// Returns the cached token, empty when unauthenticated
    pub async fn token(&self) -> String {
        self.cache
            .write()
            .await
            .token()
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Returns the cached profile projection
    pub async fn user_data(&self) -> Option<UserData> {
        self.cache.write().await.user_data().cloned()
    }

    /// Returns the cached refresh token
    pub async fn refresh_token(&self) -> Option<String> {
        self.cache.write().await.refresh_token().map(str::to_string)
    }

    /// Obtains a new token with the cached refresh token
    ///
    /// Returns `false` without any network call when no refresh token is
    /// cached. Any other failure, including the absence of a refresh
    /// endpoint, logs the session out before returning `false`.
    pub async fn refresh_session(&self) -> bool {
        self.try_refresh().await == RefreshOutcome::Refreshed
    }

    /// Same as [`AuthService::refresh_session`], reporting how it ended
    pub async fn try_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.refresh_token().await.filter(|r| !r.is_empty()) else {
            tracing::debug!("No refresh token cached, skipping refresh");
            return RefreshOutcome::NoRefreshToken;
        };

        let result = match self.request_refresh(&refresh_token).await {
            Ok(response) => self.apply_refresh(response).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::info!("Session token refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                self.logout().await;
                RefreshOutcome::LoggedOut
            }
        }
    }

    /// Returns where the UI goes once the session is gone
    pub fn login_redirect(&self) -> Redirect {
        Redirect::to(&self.login_redirect)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let Some(path) = self.refresh_path.as_deref() else {
            return Err(AuthError::Config("No refresh endpoint configured".into()));
        };

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(AuthError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_response_body(status, &body));
        }

        response.json().await.map_err(AuthError::transport)
    }

    async fn apply_refresh(&self, response: RefreshResponse) -> Result<(), AuthError> {
        let token = response
            .token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let refresh_token = response.refresh_token.filter(|r| !r.is_empty());

        {
            let mut cache = self.cache.write().await;
            cache.write(SessionField::Token, Some(&token))?;
            if let Some(refresh) = refresh_token.as_deref() {
                cache.write(SessionField::RefreshToken, Some(refresh))?;
            }
        }

        self.cookies.mirror_tokens(&token, refresh_token.as_deref());
        self.touch_marker().await;
        Ok(())
    }

    /// Re-reads the session after another instance changed the shared store
    pub async fn sync_from_storage(&self) {
        let mut cache = self.cache.write().await;
        cache.rehydrate();
        tracing::debug!(
            "Session re-hydrated from storage (authenticated: {})",
            cache.token().is_some()
        );
    }

    /// Handles a storage change notification
    ///
    /// Returns true when the event touched a watched key and the cache was
    /// re-hydrated.
    pub async fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        let relevant = match event.key.as_deref() {
            None => true,
            Some(key) => SessionField::is_watched_key(key),
        };
        if relevant {
            self.sync_from_storage().await;
        }
        relevant
    }

    /// Reads the cross-instance change marker from storage
    pub async fn last_updated_marker(&self) -> Option<String> {
        let cache = self.cache.read().await;
        cache.storage().get(AUTH_LAST_UPDATED_KEY).ok().flatten()
    }

    async fn touch_marker(&self) {
        let stamp = Utc::now().timestamp_millis().to_string();
        let cache = self.cache.read().await;
        if let Err(e) = cache.storage().set(AUTH_LAST_UPDATED_KEY, &stamp) {
            tracing::debug!("Failed to write session marker: {}", e);
        }
    }
}
