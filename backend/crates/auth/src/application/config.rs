//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::net::IpAddr;
use std::time::Duration;

use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Per-flow rate limits
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub signup: RateLimitConfig,
    pub login: RateLimitConfig,
    pub refresh: RateLimitConfig,
    pub logout: RateLimitConfig,
    pub forgot_password: RateLimitConfig,
    pub reset_password: RateLimitConfig,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            signup: RateLimitConfig::new(5, 15 * 60),
            login: RateLimitConfig::new(10, 15 * 60),
            refresh: RateLimitConfig::new(30, 60),
            logout: RateLimitConfig::new(30, 60),
            forgot_password: RateLimitConfig::new(5, 3600),
            reset_password: RateLimitConfig::new(10, 3600),
        }
    }
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing key for access and refresh tokens
    pub jwt_secret: Vec<u8>,
    /// `iss` claim written and required on every token
    pub jwt_issuer: String,
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token and session row lifetime (30 days)
    pub refresh_token_ttl: Duration,
    /// Password reset token lifetime (60 minutes)
    pub reset_token_ttl: Duration,
    pub access_cookie_name: String,
    pub refresh_cookie_name: String,
    /// Readable by scripts so the client can echo it back
    pub fingerprint_cookie_name: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// HMAC key sealing audit entries
    pub audit_key: Vec<u8>,
    /// Reset links are `{reset_url_base}?token=...`
    pub reset_url_base: String,
    /// Upper bound for any single request
    pub request_timeout: Duration,
    /// Peers whose `X-Forwarded-For` is honoured; empty means the socket
    /// address is always the client
    pub trusted_proxies: Vec<IpAddr>,
    pub rate_limits: RateLimits,
    /// Pending reset mails held before new ones are dropped
    pub outbox_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: vec![0u8; 32],
            jwt_issuer: "compliance-portal".to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            reset_token_ttl: Duration::from_secs(60 * 60),
            access_cookie_name: "access_token".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            fingerprint_cookie_name: "device_fp".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
            audit_key: vec![0u8; 32],
            reset_url_base: "http://localhost:3000/reset-password".to_string(),
            request_timeout: Duration::from_secs(30),
            trusted_proxies: Vec::new(),
            rate_limits: RateLimits::default(),
            outbox_capacity: 256,
        }
    }
}

impl AuthConfig {
    /// Create config with random signing and audit keys
    pub fn with_random_secret() -> Self {
        Self {
            jwt_secret: random_key(),
            audit_key: random_key(),
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl.as_secs() as i64
    }

    pub fn refresh_token_ttl_secs(&self) -> i64 {
        self.refresh_token_ttl.as_secs() as i64
    }

    pub fn reset_token_ttl_minutes(&self) -> i64 {
        (self.reset_token_ttl.as_secs() / 60) as i64
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

fn random_key() -> Vec<u8> {
    use rand::RngCore;
    let mut secret = vec![0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.access_token_ttl_secs(), 900);
        assert_eq!(config.refresh_token_ttl_secs(), 2_592_000);
        assert_eq!(config.reset_token_ttl_minutes(), 60);
        assert_eq!(config.access_cookie_name, "access_token");
        assert!(config.cookie_secure);
        assert!(config.trusted_proxies.is_empty());
    }

    #[test]
    fn test_development_uses_random_keys() {
        let a = AuthConfig::development();
        let b = AuthConfig::development();
        assert!(!a.cookie_secure);
        assert_ne!(a.jwt_secret, b.jwt_secret);
        assert_ne!(a.jwt_secret, vec![0u8; 32]);
    }
}
