//! Refresh Token Entity (session row)
//!
//! A row is active while `revoked_at` is unset and `expires_at` lies in the
//! future. Once revoked it is never touched again.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::ids::{RefreshTokenId, UserId};

#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// Row id, equal to the `jti` claim of the refresh JWT
    pub id: RefreshTokenId,
    pub user_id: UserId,
    /// SHA-256 hex of the token value; the raw value is never stored
    pub token_hash: String,
    /// Client-supplied device identifier
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    /// Cookie persistence choice, carried across rotations
    pub remember_me: bool,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Device details recorded with a session
#[derive(Debug, Clone, Default)]
pub struct SessionDevice {
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

impl RefreshToken {
    pub fn new(
        id: RefreshTokenId,
        user_id: UserId,
        token_hash: String,
        device: &SessionDevice,
        remember_me: bool,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            user_id,
            token_hash,
            fingerprint: device.fingerprint.clone(),
            user_agent: device.user_agent.clone(),
            ip: device.ip.clone(),
            remember_me,
            expires_at: now + ttl,
            revoked_at: None,
            created_at: now,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }

    /// Full TTL this row was issued with
    pub fn ttl(&self) -> Duration {
        self.expires_at - self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ttl: Duration) -> RefreshToken {
        RefreshToken::new(
            RefreshTokenId::new(),
            UserId::new(),
            "hash".to_string(),
            &SessionDevice::default(),
            true,
            ttl,
        )
    }

    #[test]
    fn test_active_until_expiry() {
        let token = row(Duration::hours(1));
        assert!(token.is_active(Utc::now()));
        assert!(!token.is_active(Utc::now() + Duration::hours(2)));
    }

    #[test]
    fn test_revoked_is_inactive() {
        let mut token = row(Duration::hours(1));
        token.revoked_at = Some(Utc::now());
        assert!(!token.is_active(Utc::now()));
    }

    #[test]
    fn test_ttl() {
        assert_eq!(row(Duration::days(30)).ttl(), Duration::days(30));
    }
}
