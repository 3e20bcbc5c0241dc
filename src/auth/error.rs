//! Authentication errors
//!
//! HTTP failures are decoded into an [`AuthError`] once, at the boundary, so
//! callers match on a closed set of kinds instead of inspecting payloads.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::security::SanitizerError;
use crate::storage::StorageError;

/// Message shown when the server gives no usable explanation
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";

/// Errors returned by session mutations
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login call succeeded but the response carried no token
    #[error("Login response did not include a token")]
    MissingToken,

    /// The server answered with a non-success status
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// The request never produced a response
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: reqwest::Error,
    },

    /// Login form input was rejected before sending
    #[error("{0}")]
    InvalidInput(#[from] SanitizerError),

    /// Persisting the session failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The service could not be set up
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Closed set of [`AuthError`] categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    MissingToken,
    Http,
    Transport,
    InvalidInput,
    Storage,
    Config,
}

impl AuthError {
    /// Returns the category of this error
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::MissingToken => AuthErrorKind::MissingToken,
            Self::Http { .. } => AuthErrorKind::Http,
            Self::Transport { .. } => AuthErrorKind::Transport,
            Self::InvalidInput(_) => AuthErrorKind::InvalidInput,
            Self::Storage(_) => AuthErrorKind::Storage,
            Self::Config(_) => AuthErrorKind::Config,
        }
    }

    /// Returns the HTTP status for [`AuthError::Http`]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Builds an error from a non-success response body
    ///
    /// Uses the payload's `message` field when present, otherwise the
    /// generic login failure message.
    pub(crate) fn from_response_body(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorPayload>(body)
            .ok()
            .and_then(|p| p.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string());
        Self::Http { status, message }
    }

    pub(crate) fn transport(source: reqwest::Error) -> Self {
        Self::Transport {
            message: LOGIN_FAILED_MESSAGE.to_string(),
            source,
        }
    }
}

/// Error body shape used by the storefront API
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_payload() {
        let err = AuthError::from_response_body(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid username or password"}"#,
        );
        assert_eq!(err.kind(), AuthErrorKind::Http);
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.to_string(), "Invalid username or password");
    }

    #[test]
    fn test_generic_message_fallback() {
        for body in ["", "<html>bad gateway</html>", r#"{"error":"x"}"#, r#"{"message":"  "}"#] {
            let err = AuthError::from_response_body(StatusCode::BAD_GATEWAY, body);
            assert_eq!(err.to_string(), LOGIN_FAILED_MESSAGE, "body: {body}");
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(AuthError::MissingToken.kind(), AuthErrorKind::MissingToken);
        assert_eq!(
            AuthError::from(SanitizerError::EmptyInput("Password")).kind(),
            AuthErrorKind::InvalidInput
        );
        assert_eq!(
            AuthError::from(StorageError::Unavailable).kind(),
            AuthErrorKind::Storage
        );
        assert_eq!(AuthError::Config("x".into()).kind(), AuthErrorKind::Config);
        assert_eq!(AuthError::MissingToken.status(), None);
    }
}
