//! Auth Services
//!
//! The collaborators every flow needs, constructed once at process start
//! and shared behind an `Arc`.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::AuditLogger;
use crate::application::config::AuthConfig;
use crate::application::credentials::CredentialStore;
use crate::application::mail::MailOutbox;
use crate::application::rate_limit::RateLimiter;
use crate::application::session_store::{IssuedSession, SessionStore};
use crate::application::token_service::TokenService;
use crate::domain::entity::refresh_token::SessionDevice;
use crate::domain::entity::user::User;
use crate::domain::repository::AuthStore;

pub struct AuthServices<S, L> {
    pub store: Arc<S>,
    pub rate_limiter: RateLimiter<L>,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub sessions: SessionStore,
    pub audit: AuditLogger,
    pub outbox: MailOutbox,
    pub config: Arc<AuthConfig>,
}

impl<S, L> AuthServices<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(store: Arc<S>, limiter_store: Arc<L>, outbox: MailOutbox, config: AuthConfig) -> Self {
        let tokens = TokenService::new(&config);
        Self {
            store,
            rate_limiter: RateLimiter::new(limiter_store, config.rate_limits.clone()),
            sessions: SessionStore::new(tokens.clone()),
            tokens,
            credentials: CredentialStore::new(&config),
            audit: AuditLogger::new(&config.audit_key),
            outbox,
            config: Arc::new(config),
        }
    }
}

/// Tokens and profile returned by every session-issuing flow
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub remember_me: bool,
    pub user: User,
}

impl SessionOutput {
    pub(crate) fn new(issued: IssuedSession, user: User, config: &AuthConfig) -> Self {
        Self {
            access_token: issued.access_token.token,
            refresh_token: issued.refresh_token.token,
            expires_in: config.access_token_ttl_secs(),
            remember_me: issued.session.remember_me,
            user,
        }
    }
}

/// Session device details from the request origin and client fingerprint
pub fn session_device(client: &ClientInfo, fingerprint: Option<String>) -> SessionDevice {
    SessionDevice {
        fingerprint,
        user_agent: client.user_agent.clone(),
        ip: client.ip_string(),
    }
}
