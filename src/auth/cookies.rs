//! Session cookies mirrored for server-side route checks
//!
//! The jar is shared with the HTTP client, so every request to the API origin
//! carries the `token`, `refreshToken` and `userData` cookies while a session
//! exists. `userData` is stored as base64url-encoded JSON to stay within the
//! cookie value grammar.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

use super::error::AuthError;
use super::session::{Session, SessionField, UserData};

/// Cookie jar scoped to the API origin
pub struct CookieMirror {
    jar: Arc<Jar>,
    url: Url,
    max_age_secs: i64,
}

impl CookieMirror {
    /// Creates a mirror for `base_url` whose cookies live `max_age_days`
    pub fn new(base_url: &str, max_age_days: i64) -> Result<Self, AuthError> {
        let url = Url::parse(base_url)
            .map_err(|e| AuthError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;
        Ok(Self {
            jar: Arc::new(Jar::default()),
            url,
            max_age_secs: chrono::Duration::days(max_age_days).num_seconds(),
        })
    }

    /// Returns the jar to install in an HTTP client
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Sets a cookie with the configured max age
    pub fn set(&self, name: &str, value: &str) {
        let cookie = format!(
            "{}={}; Max-Age={}; Path=/; SameSite=Strict",
            name, value, self.max_age_secs
        );
        self.jar.add_cookie_str(&cookie, &self.url);
    }

    /// Expires a cookie immediately
    pub fn expire(&self, name: &str) {
        let cookie = format!("{}=; Max-Age=0; Path=/", name);
        self.jar.add_cookie_str(&cookie, &self.url);
    }

    /// Returns the current value of a cookie sent to the API origin
    pub fn get(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.to_string())
    }

    /// Mirrors a freshly written session
    pub fn mirror_session(&self, session: &Session) {
        self.set(SessionField::Token.key(), &session.token);

        match &session.refresh_token {
            Some(refresh) => self.set(SessionField::RefreshToken.key(), refresh),
            None => self.expire(SessionField::RefreshToken.key()),
        }

        match session.user_data.as_ref().and_then(encode_user_data) {
            Some(encoded) => self.set(SessionField::UserData.key(), &encoded),
            None => self.expire(SessionField::UserData.key()),
        }
    }

    /// Updates the token cookies after a refresh
    pub fn mirror_tokens(&self, token: &str, refresh_token: Option<&str>) {
        self.set(SessionField::Token.key(), token);
        if let Some(refresh) = refresh_token {
            self.set(SessionField::RefreshToken.key(), refresh);
        }
    }

    /// Expires every session cookie
    pub fn clear_session(&self) {
        for field in SessionField::ALL {
            self.expire(field.key());
        }
    }

    /// Decodes the `userData` cookie
    pub fn user_data(&self) -> Option<UserData> {
        let encoded = self.get(SessionField::UserData.key())?;
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

fn encode_user_data(user: &UserData) -> Option<String> {
    serde_json::to_vec(user)
        .ok()
        .map(|json| URL_SAFE_NO_PAD.encode(json))
}
