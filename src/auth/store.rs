//! Reactive auth store
//!
//! Wraps [`AuthService`] for UI code: subscribers receive an [`AuthState`]
//! through a `watch` channel, login and logout carry a loading flag, and the
//! last error stays visible until [`AuthStore::clear_error`] is called.
//!
//! Session checks are throttled: the cache is consulted again only once the
//! staleness threshold has elapsed since the previous check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::service::AuthService;
use super::session::{Redirect, UserData};

/// Snapshot of the session as the UI sees it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user: Option<UserData>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Observable session state backed by an [`AuthService`]
pub struct AuthStore {
    service: Arc<AuthService>,
    staleness: chrono::Duration,
    state: watch::Sender<AuthState>,
}

impl AuthStore {
    /// Creates a store re-validating at most once per `staleness`
    pub fn new(service: Arc<AuthService>, staleness: Duration) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            service,
            staleness: chrono::Duration::from_std(staleness)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
            state,
        }
    }

    /// Returns the underlying service
    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }

    /// Returns the current state
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Logs in and publishes the result
    ///
    /// Returns true on success. Failures are recorded in `error`, which is
    /// not cleared by later attempts.
    pub async fn login(&self, identifier: &str, password: &str) -> bool {
        if !self.service.is_available().await {
            return false;
        }

        self.state.send_modify(|s| s.is_loading = true);

        match self.service.login(identifier, password).await {
            Ok(_) => {
                let user = self.service.user_data().await;
                self.state.send_modify(|s| {
                    s.is_authenticated = true;
                    s.user = user;
                    s.is_loading = false;
                    s.last_checked = Some(Utc::now());
                });
                true
            }
            Err(e) => {
                tracing::debug!("Login failed: {}", e);
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                false
            }
        }
    }

    /// Logs out and returns the redirect the UI must follow
    ///
    /// `None` when there is no storage runtime.
    pub async fn logout(&self) -> Option<Redirect> {
        if !self.service.is_available().await {
            return None;
        }

        self.state.send_modify(|s| s.is_loading = true);
        let redirect = self.service.logout().await;
        self.state.send_modify(|s| {
            s.is_authenticated = false;
            s.user = None;
            s.is_loading = false;
            s.last_checked = Some(Utc::now());
        });
        Some(redirect)
    }

    /// Dismisses the current error
    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    /// Returns whether the session is authenticated, re-checking the cache
    /// only when the last check is older than the staleness threshold
    pub async fn check_auth(&self) -> bool {
        if !self.service.is_available().await {
            return false;
        }

        let current = self.state();
        if let Some(checked) = current.last_checked {
            if Utc::now().signed_duration_since(checked) <= self.staleness {
                return current.is_authenticated;
            }
        }

        self.revalidate().await
    }

    /// Re-reads the session from the cache regardless of staleness
    pub async fn revalidate(&self) -> bool {
        if !self.service.is_available().await {
            return false;
        }

        let is_authenticated = self.service.is_authenticated().await;
        let user = if is_authenticated {
            self.service.user_data().await
        } else {
            None
        };

        self.state.send_if_modified(|s| {
            let changed = s.is_authenticated != is_authenticated || s.user != user;
            s.is_authenticated = is_authenticated;
            s.user = user;
            s.last_checked = Some(Utc::now());
            changed
        });
        is_authenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::{MemoryStorage, UnavailableStorage};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);

    async fn store_with(
        server: &MockServer,
        storage: MemoryStorage,
        staleness: Duration,
    ) -> AuthStore {
        let config = AppConfig {
            api_base_url: server.uri(),
            ..AppConfig::default()
        };
        let service = AuthService::new(&config, Arc::new(storage)).unwrap();
        AuthStore::new(Arc::new(service), staleness)
    }

    #[tokio::test]
    async fn test_login_publishes_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "token": "abc123", "fullName": "Jane Doe" })),
            )
            .mount(&server)
            .await;

        let store = store_with(&server, MemoryStorage::new(), FIVE_MINUTES).await;
        let mut rx = store.subscribe();

        assert!(store.login("user@example.com", "secret1!").await);
        assert!(rx.has_changed().unwrap());

        let state = rx.borrow_and_update().clone();
        assert!(state.is_authenticated);
        assert!(!state.is_loading);
        assert!(state.last_checked.is_some());
        assert_eq!(
            state.user.and_then(|u| u.full_name),
            Some("Jane Doe".to_string())
        );
    }

    #[tokio::test]
    async fn test_error_persists_until_cleared() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Wrong password" })),
            )
            .mount(&server)
            .await;

        let store = store_with(&server, MemoryStorage::new(), FIVE_MINUTES).await;

        assert!(!store.login("user@example.com", "nope").await);
        assert_eq!(store.state().error.as_deref(), Some("Wrong password"));
        assert!(!store.state().is_loading);

        // A later check does not dismiss the banner
        store.check_auth().await;
        assert_eq!(store.state().error.as_deref(), Some("Wrong password"));

        store.clear_error();
        assert_eq!(store.state().error, None);
    }

    #[tokio::test]
    async fn test_check_auth_is_throttled() {
        let server = MockServer::start().await;
        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let store = store_with(&server, storage, FIVE_MINUTES).await;

        assert!(store.check_auth().await);

        // Session dropped behind the store's back
        store.service().logout().await;

        assert!(store.check_auth().await, "within threshold, no re-read");
        assert!(!store.revalidate().await);
        assert!(!store.check_auth().await);
    }

    #[tokio::test]
    async fn test_check_auth_without_throttle_rereads() {
        let server = MockServer::start().await;
        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let store = store_with(&server, storage, Duration::ZERO).await;

        assert!(store.check_auth().await);
        store.service().logout().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!store.check_auth().await);
    }

    #[tokio::test]
    async fn test_logout_resets_state() {
        let server = MockServer::start().await;
        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let store = store_with(&server, storage, FIVE_MINUTES).await;

        assert!(store.check_auth().await);
        let redirect = store.logout().await;

        assert_eq!(redirect, Some(Redirect::to("/login")));
        let state = store.state();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_runtime_is_noop() {
        let server = MockServer::start().await;
        let config = AppConfig {
            api_base_url: server.uri(),
            ..AppConfig::default()
        };
        let service = AuthService::new(&config, Arc::new(UnavailableStorage)).unwrap();
        let store = AuthStore::new(Arc::new(service), FIVE_MINUTES);

        assert!(!store.login("user@example.com", "secret1!").await);
        assert!(store.logout().await.is_none());
        assert!(!store.check_auth().await);
        assert_eq!(store.state(), AuthState::default());
    }
}
