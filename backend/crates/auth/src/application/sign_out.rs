//! Sign Out Use Case
//!
//! Revokes the session row behind a refresh token.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::audit_entry;
use crate::application::rate_limit::{RateLimitSection, token_identifier};
use crate::application::services::AuthServices;
use crate::domain::entity::audit_log::AuditEvent;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};

/// Sign out use case
pub struct SignOutUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> SignOutUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    /// Fails with `TokenNotFound` when no active session matches the token
    pub async fn execute(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<()> {
        let s = &self.services;

        s.rate_limiter
            .check(
                RateLimitSection::Logout,
                &token_identifier(refresh_token, client),
            )
            .await?;

        let mut tx = s.store.begin().await?;

        let session = s
            .sessions
            .lookup_active(&mut tx, refresh_token)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if !s.sessions.revoke(&mut tx, &session).await? {
            return Err(AuthError::TokenNotFound);
        }

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(
                    AuditEvent::Logout,
                    Some(session.user_id),
                    "User logged out",
                    client,
                )
                .with_metadata(serde_json::json!({ "sessionId": session.id.to_string() })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.id,
            "User logged out"
        );

        Ok(())
    }
}
