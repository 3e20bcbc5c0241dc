//! Redaction for logs and validation for login form input
//!
//! Identifiers and tokens pass through here before they reach a `tracing`
//! call, and login credentials are checked here before any request is sent.

use thiserror::Error;

/// Longest accepted identifier (username, email or phone) in bytes
pub const MAX_IDENTIFIER_LEN: usize = 254;
/// Longest accepted password in bytes
pub const MAX_PASSWORD_LEN: usize = 128;

/// Errors produced by login input validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizerError {
    /// A required field is empty
    #[error("{0} cannot be empty")]
    EmptyInput(&'static str),

    /// A field exceeds its maximum length
    #[error("{field} exceeds maximum length of {max}")]
    TooLong { field: &'static str, max: usize },

    /// The input contains control characters
    #[error("{0} contains invalid characters")]
    InvalidInput(&'static str),
}

/// What kind of identifier a user typed into the login form
///
/// Only a hint for the UI; the login endpoint accepts all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Email,
    Phone,
    Username,
}

/// Redaction and validation helpers
pub struct Sanitizer;

impl Sanitizer {
    /// Redacts an email or phone number for logging
    ///
    /// # Examples
    ///
    /// ```
    /// use doca_session::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_identifier("user@example.com"), "us...@example.com");
    /// assert_eq!(Sanitizer::sanitize_identifier("0912345678"), "***5678");
    /// assert_eq!(Sanitizer::sanitize_identifier("ab"), "***");
    /// ```
    pub fn sanitize_identifier(identifier: &str) -> String {
        if let Some(at) = identifier.find('@') {
            let (local, domain) = identifier.split_at(at);
            return match local.char_indices().nth(2) {
                Some((idx, _)) => format!("{}...{}", &local[..idx], domain),
                None => format!("***{}", domain),
            };
        }

        let digits: Vec<char> = identifier.chars().filter(char::is_ascii_digit).collect();
        if digits.len() > 4 {
            let tail: String = digits[digits.len() - 4..].iter().collect();
            format!("***{}", tail)
        } else {
            "***".to_string()
        }
    }

    /// Redacts a token, keeping the last four characters
    ///
    /// # Examples
    ///
    /// ```
    /// use doca_session::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("abc123xyz"), "***3xyz");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        let count = token.chars().count();
        if count > 4 {
            let tail: String = token.chars().skip(count - 4).collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Drops the query string and fragment from a URL or path
    pub fn sanitize_url(url: &str) -> String {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].to_string()
    }

    /// Validates a login identifier and classifies it
    ///
    /// Only empty, overlong or control-character input is rejected. Anything
    /// made of digits with an optional leading `+` and space, dash or dot
    /// separators is a phone number; anything else that is not an email
    /// address is a username.
    pub fn classify_identifier(identifier: &str) -> Result<IdentifierKind, SanitizerError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(SanitizerError::EmptyInput("Username, email or phone number"));
        }
        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(SanitizerError::TooLong {
                field: "Username, email or phone number",
                max: MAX_IDENTIFIER_LEN,
            });
        }
        if identifier.chars().any(char::is_control) {
            return Err(SanitizerError::InvalidInput("Username, email or phone number"));
        }

        if Self::is_email(identifier) {
            Ok(IdentifierKind::Email)
        } else if Self::is_phone(identifier) {
            Ok(IdentifierKind::Phone)
        } else {
            Ok(IdentifierKind::Username)
        }
    }

    /// Validates the password field; content is never inspected beyond length
    pub fn validate_password(password: &str) -> Result<(), SanitizerError> {
        if password.is_empty() {
            return Err(SanitizerError::EmptyInput("Password"));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(SanitizerError::TooLong {
                field: "Password",
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    fn is_email(s: &str) -> bool {
        let Some((local, domain)) = s.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.contains('@')
            && !s.chars().any(char::is_whitespace)
            && domain
                .split_once('.')
                .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
    }

    fn is_phone(s: &str) -> bool {
        let body = s.strip_prefix('+').unwrap_or(s);
        if !body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.'))
        {
            return false;
        }
        body.chars().any(|c| c.is_ascii_digit())
    }
}
