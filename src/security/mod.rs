//! Security module - Redaction, login input validation and secret handling
//!
//! - Redacting identifiers, tokens and URLs before they are logged
//! - Validating login form input
//! - Zeroizing in-memory tokens

mod sanitizer;
mod secure_string;

pub use sanitizer::{IdentifierKind, Sanitizer, SanitizerError, MAX_IDENTIFIER_LEN, MAX_PASSWORD_LEN};
pub use secure_string::SecureString;
