//! Verification Token Entity
//!
//! Single-use token bound to a user and a purpose. Usable while unconsumed
//! and unexpired.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::ids::{UserId, VerificationTokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    PasswordReset,
}

impl TokenPurpose {
    pub const fn code(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "PASSWORD_RESET",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PASSWORD_RESET" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationToken {
    pub id: VerificationTokenId,
    pub user_id: UserId,
    pub purpose: TokenPurpose,
    /// SHA-256 hex of the emailed value
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(user_id: UserId, purpose: TokenPurpose, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: VerificationTokenId::new(),
            user_id,
            purpose,
            token_hash,
            expires_at: now + ttl,
            consumed_at: None,
            created_at: now,
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_window() {
        let mut token = VerificationToken::new(
            UserId::new(),
            TokenPurpose::PasswordReset,
            "h".to_string(),
            Duration::minutes(60),
        );
        assert!(token.is_usable(Utc::now()));
        assert!(!token.is_usable(Utc::now() + Duration::minutes(61)));

        token.consumed_at = Some(Utc::now());
        assert!(!token.is_usable(Utc::now()));
    }

    #[test]
    fn test_purpose_code() {
        assert_eq!(
            TokenPurpose::from_code(TokenPurpose::PasswordReset.code()),
            Some(TokenPurpose::PasswordReset)
        );
    }
}
