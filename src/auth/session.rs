//! Session data model
//!
//! A session is the triple `{token, refreshToken, userData}`. `userData` is a
//! projection of the server's user record, not the full record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Storage key of the marker written on every session transition
pub const AUTH_LAST_UPDATED_KEY: &str = "auth_last_updated";

/// Storage keys whose change means another instance touched the session
pub const WATCHED_KEYS: [&str; 3] = ["token", "userData", AUTH_LAST_UPDATED_KEY];

/// The persisted fields of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    /// Bearer credential
    Token,
    /// Credential used to obtain a new bearer token
    RefreshToken,
    /// JSON-serialized [`UserData`]
    UserData,
}

impl SessionField {
    /// All session fields in write order
    pub const ALL: [SessionField; 3] = [Self::Token, Self::RefreshToken, Self::UserData];

    /// Returns the storage key (and cookie name) for this field
    pub fn key(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::RefreshToken => "refreshToken",
            Self::UserData => "userData",
        }
    }

    /// Returns true if `key` is one of the keys the session layer watches
    pub fn is_watched_key(key: &str) -> bool {
        WATCHED_KEYS.contains(&key)
    }
}

/// Partial user profile cached alongside the token
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl UserData {
    /// Returns the name to greet the user with
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.phone_number.as_deref())
    }
}

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user_data: Option<UserData>,
}

/// Body of a successful login response
///
/// Fields outside the projection are kept in `extra` so callers receive the
/// full response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LoginResponse {
    /// Builds the cached profile projection
    pub fn user_data(&self) -> UserData {
        UserData {
            id: self.id.clone(),
            username: self.username.clone(),
            phone_number: self.phone_number.clone(),
            full_name: self.full_name.clone(),
        }
    }

    /// Builds the session, `None` when the response carries no usable token
    pub fn session(&self) -> Option<Session> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        Some(Session {
            token: token.to_string(),
            refresh_token: self.refresh_token.clone().filter(|r| !r.is_empty()),
            user_data: Some(self.user_data()),
        })
    }
}

/// Body of a successful refresh response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// A navigation the UI layer must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: String,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// Accepts `"u1"`, `42` or `null` for identifier fields
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_keys() {
        assert_eq!(SessionField::Token.key(), "token");
        assert_eq!(SessionField::RefreshToken.key(), "refreshToken");
        assert_eq!(SessionField::UserData.key(), "userData");
    }

    #[test]
    fn test_watched_keys() {
        assert!(SessionField::is_watched_key("token"));
        assert!(SessionField::is_watched_key("userData"));
        assert!(SessionField::is_watched_key(AUTH_LAST_UPDATED_KEY));
        assert!(!SessionField::is_watched_key("refreshToken"));
        assert!(!SessionField::is_watched_key("cart"));
    }

    #[test]
    fn test_login_response_projection() {
        let response: LoginResponse = serde_json::from_value(json!({
            "token": "abc123",
            "refreshToken": "r1",
            "id": "u1",
            "username": "user@example.com",
            "fullName": "Jane Doe",
            "role": "customer"
        }))
        .unwrap();

        let session = response.session().unwrap();
        assert_eq!(session.token, "abc123");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));

        let user = session.user_data.unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.full_name.as_deref(), Some("Jane Doe"));
        assert!(user.phone_number.is_none());

        assert_eq!(response.extra.get("role"), Some(&json!("customer")));
    }

    #[test]
    fn test_numeric_id() {
        let user: UserData = serde_json::from_value(json!({ "id": 42 })).unwrap();
        assert_eq!(user.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_missing_or_empty_token_has_no_session() {
        let missing: LoginResponse =
            serde_json::from_value(json!({ "username": "someone" })).unwrap();
        assert!(missing.session().is_none());

        let empty: LoginResponse = serde_json::from_value(json!({ "token": "" })).unwrap();
        assert!(empty.session().is_none());
    }

    #[test]
    fn test_user_data_serializes_camel_case() {
        let user = UserData {
            id: Some("u1".into()),
            phone_number: Some("0912345678".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, json!({ "id": "u1", "phoneNumber": "0912345678" }));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let user = UserData {
            username: Some("jane".into()),
            ..Default::default()
        };
        assert_eq!(user.display_name(), Some("jane"));
        assert_eq!(UserData::default().display_name(), None);
    }
}
