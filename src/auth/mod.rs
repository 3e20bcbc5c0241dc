//! Authentication module - Session cache, auth service and reactive store
//!
//! - `cache`: in-memory mirror of the persisted session fields
//! - `service`: login, logout, refresh and read operations
//! - `store`: observable state for UI code, with a staleness throttle
//! - `cookies`: session cookies mirrored for server-side route checks

mod cache;
mod cookies;
mod error;
mod service;
mod session;
mod store;

pub use cache::AuthCache;
pub use cookies::CookieMirror;
pub use error::{AuthError, AuthErrorKind, LOGIN_FAILED_MESSAGE};
pub use service::{AuthService, RefreshOutcome, LOGIN_PATH};
pub use session::{
    LoginResponse, Redirect, Session, SessionField, UserData, AUTH_LAST_UPDATED_KEY, WATCHED_KEYS,
};
pub use store::{AuthState, AuthStore};
