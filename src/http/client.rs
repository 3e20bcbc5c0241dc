//! Authenticated API client
//!
//! Every request carries the cached bearer token. A 401 on a request that has
//! not been retried yet triggers one token refresh and one resend; a request
//! is never retried twice.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::monitor::{ApiCall, ApiMonitor};
use crate::auth::{AuthService, Redirect, RefreshOutcome};
use crate::security::Sanitizer;

/// Errors returned by [`ApiClient`]
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    /// The token could not be refreshed; the session has been cleared
    #[error("Session expired: {message}")]
    SessionExpired { redirect: Redirect, message: String },

    /// The request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(serde_json::Error),

    /// The response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns the HTTP status behind this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::SessionExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the navigation the UI must perform, if any
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::SessionExpired { redirect, .. } => Some(redirect),
            _ => None,
        }
    }

    fn from_response(status: StatusCode, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Payload {
            message: Option<String>,
        }

        let message = serde_json::from_str::<Payload>(body)
            .ok()
            .and_then(|p| p.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        Self::Http { status, message }
    }
}

/// A request to the storefront API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/api/v1/products`
    pub path: String,
    pub body: Option<Value>,
    /// Set once the request has been resent after a token refresh
    pub retried: bool,
}

impl ApiRequest {
    /// Creates a request without a body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            retried: false,
        }
    }

    /// Creates a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Attaches a JSON body
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(ApiError::Encode)?);
        Ok(self)
    }
}

/// HTTP client that authenticates requests and recovers from expired tokens
pub struct ApiClient {
    auth: Arc<AuthService>,
    monitor: Arc<ApiMonitor>,
}

impl ApiClient {
    /// Creates a client sharing the auth service's HTTP client and cookies
    pub fn new(auth: Arc<AuthService>, monitor: Arc<ApiMonitor>) -> Self {
        Self { auth, monitor }
    }

    /// Returns the call monitor
    pub fn monitor(&self) -> &Arc<ApiMonitor> {
        &self.monitor
    }

    /// Sends a request, refreshing the token and resending once on 401
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        loop {
            let response = self.dispatch(&request).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            let body = response.text().await.unwrap_or_default();
            let error = ApiError::from_response(status, &body);

            if status != StatusCode::UNAUTHORIZED || request.retried {
                return Err(error);
            }

            request.retried = true;
            let redirect = match self.auth.try_refresh().await {
                RefreshOutcome::Refreshed => {
                    tracing::debug!("Token refreshed, resending {} {}", request.method, request.path);
                    continue;
                }
                RefreshOutcome::NoRefreshToken => self.auth.logout().await,
                RefreshOutcome::LoggedOut => self.auth.login_redirect(),
            };
            tracing::info!("Session expired, redirecting to {}", redirect.location);
            return Err(ApiError::SessionExpired {
                redirect,
                message: error.to_string(),
            });
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.auth.base_url(), request.path);
        let mut builder = self
            .auth
            .http_client()
            .request(request.method.clone(), &url);

        let token = self.auth.token().await;
        if !token.is_empty() {
            builder = builder.bearer_auth(&token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started_at = Utc::now();
        let timer = Instant::now();
        let result = builder.send().await;

        self.monitor
            .record(ApiCall {
                method: request.method.to_string(),
                path: Sanitizer::sanitize_url(&request.path),
                status: result.as_ref().ok().map(|r| r.status().as_u16()),
                duration_ms: timer.elapsed().as_millis() as u64,
                started_at,
                retried: request.retried,
                error: result.as_ref().err().map(|e| e.to_string()),
            })
            .await;

        Ok(result?)
    }

    /// GETs `path` and decodes the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(ApiRequest::get(path)).await?;
        decode(response).await
    }

    /// POSTs `body` as JSON to `path` and decodes the JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(Method::POST, path).with_json(body)?;
        decode(self.send(request).await?).await
    }

    /// PUTs `body` as JSON to `path` and decodes the JSON response
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(Method::PUT, path).with_json(body)?;
        decode(self.send(request).await?).await
    }

    /// DELETEs `path`, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::auth::AUTH_LAST_UPDATED_KEY;
    use crate::storage::{MemoryStorage, Storage, StorageError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REFRESH_PATH: &str = "/api/v1/refresh-token";

    fn client_for(server: &MockServer, storage: &MemoryStorage) -> ApiClient {
        client_over(server, Arc::new(storage.clone()))
    }

    fn client_over(server: &MockServer, storage: Arc<dyn Storage>) -> ApiClient {
        let config = AppConfig {
            api_base_url: server.uri(),
            refresh_path: Some(REFRESH_PATH.into()),
            ..AppConfig::default()
        };
        let auth = AuthService::new(&config, storage).unwrap();
        ApiClient::new(Arc::new(auth), Arc::new(ApiMonitor::new(10)))
    }

    /// Memory store counting writes of the session change marker
    struct MarkerCounter {
        inner: MemoryStorage,
        writes: AtomicUsize,
    }

    impl Storage for MarkerCounter {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == AUTH_LAST_UPDATED_KEY {
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn signed_in() -> MemoryStorage {
        MemoryStorage::with_entries([("token", "abc123"), ("refreshToken", "r1")])
    }

    async fn mount_refresh(server: &MockServer, status: u16, expected: u64) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(json!({ "token": "def456" })),
            )
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/products"))
            .and(header("Authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &signed_in());
        let products: Vec<Value> = assert_ok!(client.get_json("/api/v1/products").await);
        assert_eq!(products.len(), 1);
    }

    #[tokio::test]
    async fn test_no_header_when_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/blogs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server, &MemoryStorage::new());
        let _: Vec<Value> = assert_ok!(client.get_json("/api/v1/blogs").await);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_refreshes_and_retries_once_on_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orders"))
            .and(header("Authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orders"))
            .and(header("Authorization", "Bearer def456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "orders": [] })))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, 1).await;

        let client = client_for(&server, &signed_in());
        let body: Value = assert_ok!(client.get_json("/api/v1/orders").await);
        assert_eq!(body, json!({ "orders": [] }));

        let stats = client.monitor().stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unauthorized, 1);
        assert_eq!(stats.retried, 1);
    }

    #[tokio::test]
    async fn test_second_401_does_not_refresh_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orders"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, 1).await;

        let storage = signed_in();
        let client = client_for(&server, &storage);
        let err = assert_err!(client.send(ApiRequest::get("/api/v1/orders")).await);

        assert!(matches!(err, ApiError::Http { status: StatusCode::UNAUTHORIZED, .. }));
        assert!(err.redirect().is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_expires_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 500, 1).await;

        let storage = signed_in();
        let client = client_for(&server, &storage);
        let err = assert_err!(client.send(ApiRequest::get("/api/v1/orders")).await);

        assert_eq!(err.redirect(), Some(&Redirect::to("/login")));
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(err.to_string().contains("Token expired"));
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[tokio::test]
    async fn test_session_expiry_signals_other_instances_once() {
        for (entries, refresh_calls) in [
            (vec![("token", "abc123"), ("refreshToken", "r1")], 1),
            (vec![("token", "abc123")], 0),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/v1/orders"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;
            mount_refresh(&server, 500, refresh_calls).await;

            let storage = Arc::new(MarkerCounter {
                inner: MemoryStorage::with_entries(entries),
                writes: AtomicUsize::new(0),
            });
            let client = client_over(&server, storage.clone());
            let err = assert_err!(client.send(ApiRequest::get("/api/v1/orders")).await);

            assert!(matches!(err, ApiError::SessionExpired { .. }));
            assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
            assert_eq!(storage.inner.get("token").unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_401_without_refresh_token_logs_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orders"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server, 200, 0).await;

        let storage = MemoryStorage::with_entries([("token", "abc123")]);
        let client = client_for(&server, &storage);
        let err = assert_err!(client.send(ApiRequest::get("/api/v1/orders")).await);

        assert!(matches!(err, ApiError::SessionExpired { .. }));
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[tokio::test]
    async fn test_other_errors_use_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/cart"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({ "message": "Out of stock" })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, &signed_in());
        let result: Result<Value, _> = client
            .post_json("/api/v1/cart", &json!({ "productId": "p1", "quantity": 2 }))
            .await;

        match result {
            Err(ApiError::Http { status, message }) => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(message, "Out of stock");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/products/p1"))
            .and(header("Authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, &signed_in());
        assert_ok!(client.delete("/api/v1/products/p1").await);
    }
}
