//! Email Value Object
//!
//! Keeps the address as entered for display and a normalized form
//! (NFKC, trimmed, lowercased) used as the unique lookup key.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

use crate::error::{AuthError, AuthResult};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Email address value object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Email {
    original: String,
    normalized: String,
}

impl Email {
    /// Create a new email with validation
    pub fn new(email: impl Into<String>) -> AuthResult<Self> {
        let original = email.into().trim().to_string();
        let normalized = Self::normalize(&original);

        if normalized.is_empty() {
            return Err(AuthError::field("email", "Email cannot be empty"));
        }

        if normalized.len() > EMAIL_MAX_LENGTH {
            return Err(AuthError::field(
                "email",
                format!("Email must be at most {} characters", EMAIL_MAX_LENGTH),
            ));
        }

        if !Self::is_valid_format(&normalized) {
            return Err(AuthError::field("email", "Invalid email format"));
        }

        Ok(Self {
            original,
            normalized,
        })
    }

    /// Normalized lookup key for an arbitrary input
    ///
    /// Lookups with unvalidated input use this so that a malformed address
    /// simply finds nothing.
    pub fn normalize(raw: &str) -> String {
        raw.nfkc().collect::<String>().trim().to_lowercase()
    }

    fn is_valid_format(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };

        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }

        if domain.is_empty() || !domain.contains('.') {
            return false;
        }

        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return false;
        }

        !(domain.starts_with('.')
            || domain.ends_with('.')
            || domain.starts_with('-')
            || domain.ends_with('-'))
    }

    /// Rebuild from stored columns (assumed already validated)
    pub fn from_db(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            normalized: normalized.into(),
        }
    }

    /// The address as the user entered it
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The unique lookup key
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl FromStr for Email {
    type Err = AuthError;

    fn from_str(s: &str) -> AuthResult<Self> {
        Email::new(s)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        let email = Email::new("  Alice@Example.COM ").unwrap();
        assert_eq!(email.original(), "Alice@Example.COM");
        assert_eq!(email.normalized(), "alice@example.com");
    }

    #[test]
    fn test_nfkc_folds_fullwidth() {
        // Fullwidth letters fold to ASCII
        let email = Email::new("ａｌｉｃｅ@example.com").unwrap();
        assert_eq!(email.normalized(), "alice@example.com");
    }

    #[test]
    fn test_invalid_formats() {
        for bad in ["", "plain", "@example.com", "a@", "a@b", "a@@b.com", "a@-b.com", "a@b.com."] {
            assert!(Email::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_too_long() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(Email::new(long).is_err());
    }

    #[test]
    fn test_validation_error_names_field() {
        match Email::new("nope") {
            Err(AuthError::Validation(details)) => assert!(details.contains_key("email")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
