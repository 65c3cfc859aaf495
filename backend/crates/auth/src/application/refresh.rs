//! Refresh Use Case
//!
//! Exchanges a refresh token for a new token pair. Every successful refresh
//! rotates the session row; the presented token is dead afterwards.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::audit_entry;
use crate::application::rate_limit::{RateLimitSection, token_identifier};
use crate::application::services::{AuthServices, SessionOutput, session_device};
use crate::domain::entity::audit_log::AuditEvent;
use crate::domain::repository::{AuthStore, AuthTransaction, FindUserById};
use crate::domain::value_object::ids::UserId;
use crate::error::{AuthError, AuthResult};

/// Refresh input
#[derive(Debug, Clone)]
pub struct RefreshInput {
    pub refresh_token: String,
    pub fingerprint: Option<String>,
}

/// Refresh use case
pub struct RefreshUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> RefreshUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    pub async fn execute(
        &self,
        input: RefreshInput,
        client: &ClientInfo,
    ) -> AuthResult<SessionOutput> {
        let s = &self.services;

        s.rate_limiter
            .check(
                RateLimitSection::Refresh,
                &token_identifier(&input.refresh_token, client),
            )
            .await?;

        let claims = s.tokens.verify_refresh(&input.refresh_token)?;
        let subject = UserId::from_uuid(claims.sub);

        let mut tx = s.store.begin().await?;

        let Some(session) = s.sessions.lookup_active(&mut tx, &input.refresh_token).await? else {
            // A correctly signed token without an active row was already
            // rotated, revoked, or expired; reuse after rotation lands here.
            tracing::warn!(
                user_id = %subject,
                jti = %claims.jti,
                "Refresh token presented for inactive session"
            );
            return Err(AuthError::TokenRevoked);
        };

        if session.user_id != subject {
            tracing::warn!(
                session_id = %session.id,
                "Refresh token subject does not own the session row"
            );
            return Err(AuthError::InvalidToken);
        }

        let user = tx
            .find_user(FindUserById { user_id: subject })
            .await?
            .ok_or(AuthError::TokenRevoked)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let device = session_device(client, input.fingerprint.or(session.fingerprint.clone()));
        let issued = s.sessions.rotate(&mut tx, &session, &user, &device).await?;

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(
                    AuditEvent::TokenRefresh,
                    Some(user.user_id),
                    "Session refreshed",
                    client,
                )
                .with_metadata(serde_json::json!({
                    "previousSessionId": session.id.to_string(),
                    "sessionId": issued.session.id.to_string(),
                })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        tracing::debug!(
            user_id = %user.user_id,
            session_id = %issued.session.id,
            "Session refreshed"
        );

        Ok(SessionOutput::new(issued, user, &s.config))
    }
}
