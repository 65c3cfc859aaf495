//! Rate Limiter
//!
//! Gate run first in every flow, before any credential, session, or audit
//! work. Counters are keyed by flow section and a caller identifier.

use std::sync::Arc;

use derive_more::Display;
use platform::client::ClientInfo;
use platform::rate_limit::{RateLimitConfig, RateLimitDecision, RateLimitStore};

use crate::application::config::RateLimits;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Token hash characters used in token-based identifiers
const TOKEN_PREFIX_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RateLimitSection {
    #[display("signup")]
    Signup,
    #[display("login")]
    Login,
    #[display("refresh")]
    Refresh,
    #[display("logout")]
    Logout,
    #[display("forgot_password")]
    ForgotPassword,
    #[display("reset_password")]
    ResetPassword,
}

pub struct RateLimiter<L> {
    store: Arc<L>,
    limits: RateLimits,
}

impl<L> RateLimiter<L>
where
    L: RateLimitStore + Sync,
{
    pub fn new(store: Arc<L>, limits: RateLimits) -> Self {
        Self { store, limits }
    }

    fn config_for(&self, section: RateLimitSection) -> &RateLimitConfig {
        match section {
            RateLimitSection::Signup => &self.limits.signup,
            RateLimitSection::Login => &self.limits.login,
            RateLimitSection::Refresh => &self.limits.refresh,
            RateLimitSection::Logout => &self.limits.logout,
            RateLimitSection::ForgotPassword => &self.limits.forgot_password,
            RateLimitSection::ResetPassword => &self.limits.reset_password,
        }
    }

    /// Count this request and fail with `RateLimitExceeded` past the limit
    ///
    /// A store failure fails the request rather than letting it through.
    pub async fn check(
        &self,
        section: RateLimitSection,
        identifier: &str,
    ) -> AuthResult<RateLimitDecision> {
        let key = format!("{}:{}", section, identifier);
        let decision = self
            .store
            .check_and_increment(&key, self.config_for(section))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !decision.allowed {
            tracing::warn!(
                section = %section,
                limit = decision.limit,
                reset_at = %decision.reset_at,
                "Rate limit exceeded"
            );
            return Err(AuthError::RateLimitExceeded(decision));
        }

        Ok(decision)
    }
}

/// `email|ip` identifier for credential-bearing flows
pub fn email_identifier(email: &str, client: &ClientInfo) -> String {
    format!("{}|{}", Email::normalize(email), client.ip_or_unknown())
}

/// `tokenPrefix|ip` identifier for token-bearing flows
///
/// Uses a prefix of the token's hash, so raw token material never ends up
/// in counter keys.
pub fn token_identifier(token: &str, client: &ClientInfo) -> String {
    let hash = platform::crypto::sha256_hex(token.as_bytes());
    format!("{}|{}", &hash[..TOKEN_PREFIX_LEN], client.ip_or_unknown())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::rate_limit::MemoryRateLimitStore;

    fn limiter(max: u32) -> RateLimiter<MemoryRateLimitStore> {
        let config = RateLimitConfig::new(max, 3600);
        RateLimiter::new(
            Arc::new(MemoryRateLimitStore::new()),
            RateLimits {
                signup: config,
                login: config,
                refresh: config,
                logout: config,
                forgot_password: config,
                reset_password: config,
            },
        )
    }

    #[tokio::test]
    async fn test_exceeding_returns_zero_remaining() {
        let limiter = limiter(2);
        limiter.check(RateLimitSection::Login, "x").await.unwrap();
        limiter.check(RateLimitSection::Login, "x").await.unwrap();

        match limiter.check(RateLimitSection::Login, "x").await {
            Err(AuthError::RateLimitExceeded(decision)) => {
                assert_eq!(decision.remaining, 0);
                assert_eq!(decision.limit, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sections_are_counted_separately() {
        let limiter = limiter(1);
        limiter.check(RateLimitSection::Login, "x").await.unwrap();
        limiter.check(RateLimitSection::Signup, "x").await.unwrap();
    }

    #[test]
    fn test_identifiers() {
        let client = ClientInfo::new(Some("10.0.0.1".parse().unwrap()), None);
        assert_eq!(
            email_identifier(" A@X.com ", &client),
            "a@x.com|10.0.0.1"
        );

        let id = token_identifier("some.jwt.value", &client);
        let (prefix, ip) = id.split_once('|').unwrap();
        assert_eq!(prefix.len(), TOKEN_PREFIX_LEN);
        assert!(!id.contains("some.jwt.value"));
        assert_eq!(ip, "10.0.0.1");
    }
}
